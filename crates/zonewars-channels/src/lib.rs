//! Channel provisioning abstraction for ZoneWars.
//!
//! The session layer never talks to a chat platform directly. It goes
//! through the [`ChannelProvisioner`] trait, which covers the handful of
//! voice-channel operations a match needs: create a group and channels,
//! move participants around, look up where someone is, and tear it all
//! down again.
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryProvisioner`], an in-process fake with
//!   fault injection, used by tests and the local demo.

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::ChannelError;
#[cfg(feature = "memory")]
pub use memory::MemoryProvisioner;

use std::future::Future;

use zonewars_protocol::{ChannelId, GroupId, ParticipantId};

/// Creates, deletes, and moves participants between voice channels.
///
/// Every method returns a `Send` future so relocation passes can run the
/// calls concurrently from inside a spawned session task. Implementors can
/// still write plain `async fn` bodies.
///
/// Move and delete failures are expected and survivable: the session layer
/// logs them and carries on with the rest of the batch.
pub trait ChannelProvisioner: Send + Sync + 'static {
    /// Creates a channel group (category) named `name`.
    fn create_group(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<GroupId, ChannelError>> + Send;

    /// Creates a voice channel named `name` inside `group`.
    fn create_channel(
        &self,
        group: GroupId,
        name: &str,
    ) -> impl Future<Output = Result<ChannelId, ChannelError>> + Send;

    /// Moves `participant` into `target`, or disconnects them from voice
    /// when `target` is `None`.
    fn move_participant(
        &self,
        participant: ParticipantId,
        target: Option<ChannelId>,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// The channel `participant` is currently connected to, if any.
    fn current_channel(
        &self,
        participant: ParticipantId,
    ) -> impl Future<Output = Option<ChannelId>> + Send;

    /// Whether `channel` still exists.
    fn channel_exists(&self, channel: ChannelId) -> impl Future<Output = bool> + Send;

    /// Deletes a voice channel.
    fn delete_channel(
        &self,
        channel: ChannelId,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Deletes a channel group.
    fn delete_group(&self, group: GroupId) -> impl Future<Output = Result<(), ChannelError>> + Send;
}
