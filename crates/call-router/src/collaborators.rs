//! Contracts with the external collaborators
//!
//! The router never talks to the network itself. The media conferencing service
//! and the telephony gateway are injected as trait objects, and their
//! notifications arrive as [`MediaEvent`] / [`TelephonyEvent`] values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{CallId, ConferenceId, ParticipantId, StreamId};

/// Media conferencing service hosting one conference per online agent
#[async_trait]
pub trait MediaConferencing: Send + Sync {
    async fn start_conference(&self) -> Result<ConferenceId>;

    async fn create_participant(&self, conference: &ConferenceId) -> Result<ParticipantId>;

    /// Let `participant` receive `stream`
    async fn subscribe(
        &self,
        conference: &ConferenceId,
        participant: &ParticipantId,
        stream: &StreamId,
    ) -> Result<()>;

    /// Tear the conference down, dropping every participant in it
    async fn end_conference(&self, conference: &ConferenceId) -> Result<()>;
}

/// Telephony gateway owning the phone calls
#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    /// Answer a ringing call by bridging it to the conference participant
    async fn answer(
        &self,
        call: &CallId,
        conference: &ConferenceId,
        participant: &ParticipantId,
    ) -> Result<()>;

    /// Keep the caller on hold; the gateway repeats the hold treatment until
    /// the call is redirected
    async fn hold(&self, call: &CallId) -> Result<()>;

    /// Move a held call into the conference participant
    async fn redirect_to_conference(
        &self,
        call: &CallId,
        conference: &ConferenceId,
        participant: &ParticipantId,
    ) -> Result<()>;

    async fn terminate(&self, call: &CallId) -> Result<()>;
}

/// Notifications from the media conferencing service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEvent {
    ParticipantJoined {
        conference: ConferenceId,
        participant: ParticipantId,
    },
    ParticipantLeft {
        conference: ConferenceId,
        participant: ParticipantId,
    },
    ParticipantPublished {
        conference: ConferenceId,
        participant: ParticipantId,
        stream: StreamId,
    },
}

impl MediaEvent {
    pub fn conference(&self) -> &ConferenceId {
        match self {
            MediaEvent::ParticipantJoined { conference, .. }
            | MediaEvent::ParticipantLeft { conference, .. }
            | MediaEvent::ParticipantPublished { conference, .. } => conference,
        }
    }
}

/// Notifications from the telephony gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelephonyEvent {
    IncomingCall { call: CallId },
    CallEnded { call: CallId },
}

impl TelephonyEvent {
    pub fn call(&self) -> &CallId {
        match self {
            TelephonyEvent::IncomingCall { call } | TelephonyEvent::CallEnded { call } => call,
        }
    }
}

/// Sending halves handed to the collaborator adapters
#[derive(Debug, Clone)]
pub struct InboundSenders {
    pub media: mpsc::Sender<MediaEvent>,
    pub telephony: mpsc::Sender<TelephonyEvent>,
}

/// Receiving halves consumed by [`crate::CallRouter::run`]
#[derive(Debug)]
pub struct InboundReceivers {
    pub media: mpsc::Receiver<MediaEvent>,
    pub telephony: mpsc::Receiver<TelephonyEvent>,
}

/// Create the bounded inbound event channels
pub fn inbound_channels(capacity: usize) -> (InboundSenders, InboundReceivers) {
    let (media_tx, media_rx) = mpsc::channel(capacity);
    let (telephony_tx, telephony_rx) = mpsc::channel(capacity);
    (
        InboundSenders { media: media_tx, telephony: telephony_tx },
        InboundReceivers { media: media_rx, telephony: telephony_rx },
    )
}
