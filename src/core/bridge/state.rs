//! Per-call bridge state machine.
//!
//! [`BridgeState`] holds the timing and flow-control fields for one call and
//! turns each inbound event from either link into the list of outbound
//! [`BridgeAction`]s to perform, in order. It does no I/O, which keeps the
//! barge-in arithmetic testable without sockets.

use std::collections::VecDeque;

use tracing::{debug, error, info, trace, warn};

use crate::core::realtime::{ClientEvent, ServerEvent};
use crate::core::telephony::{RESPONSE_MARK_NAME, TwilioIncoming, TwilioOutgoing};

/// One outbound event produced by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    /// Frame for the Twilio Media Stream
    Telephony(TwilioOutgoing),
    /// Event for the voice-AI link
    Realtime(ClientEvent),
}

/// Timing and interruption state of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeState {
    stream_sid: Option<String>,
    latest_media_timestamp: u64,
    last_assistant_item: Option<String>,
    mark_queue: VecDeque<String>,
    response_start_timestamp: Option<u64>,
    realtime_open: bool,
    log_timing_math: bool,
}

impl BridgeState {
    pub fn new(log_timing_math: bool) -> Self {
        Self {
            log_timing_math,
            ..Default::default()
        }
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    pub fn latest_media_timestamp(&self) -> u64 {
        self.latest_media_timestamp
    }

    pub fn last_assistant_item(&self) -> Option<&str> {
        self.last_assistant_item.as_deref()
    }

    pub fn pending_marks(&self) -> usize {
        self.mark_queue.len()
    }

    pub fn response_start_timestamp(&self) -> Option<u64> {
        self.response_start_timestamp
    }

    pub fn realtime_open(&self) -> bool {
        self.realtime_open
    }

    /// Record whether caller audio can currently be forwarded.
    pub fn set_realtime_open(&mut self, open: bool) {
        self.realtime_open = open;
    }

    // =========================================================================
    // Telephony -> Bridge
    // =========================================================================

    /// Apply one inbound Media Stream event.
    pub fn handle_telephony(&mut self, event: TwilioIncoming) -> Vec<BridgeAction> {
        match event {
            TwilioIncoming::Connected { protocol, version } => {
                debug!(?protocol, ?version, "Media stream connected");
                Vec::new()
            }
            TwilioIncoming::Start { start } => {
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = ?start.call_sid,
                    tracks = ?start.tracks,
                    "Incoming stream has started"
                );
                if let Some(format) = &start.media_format {
                    debug!(
                        encoding = %format.encoding,
                        sample_rate = format.sample_rate,
                        channels = format.channels,
                        "Media format"
                    );
                }
                self.on_start(start.stream_sid);
                Vec::new()
            }
            TwilioIncoming::Media { media } => self.on_media(media.timestamp, media.payload),
            TwilioIncoming::Mark { mark } => {
                trace!(name = ?mark.as_ref().map(|m| m.name.as_str()), "Mark acknowledged");
                self.on_mark();
                Vec::new()
            }
            TwilioIncoming::Dtmf { dtmf } => {
                debug!(digit = ?dtmf.map(|d| d.digit), "DTMF received");
                Vec::new()
            }
            TwilioIncoming::Stop { stream_sid } => {
                info!(?stream_sid, "Media stream stopped");
                Vec::new()
            }
            TwilioIncoming::Unknown => {
                debug!("Ignoring unrecognized media stream event");
                Vec::new()
            }
        }
    }

    fn on_start(&mut self, stream_sid: String) {
        self.stream_sid = Some(stream_sid);
        self.latest_media_timestamp = 0;
        self.response_start_timestamp = None;
        self.last_assistant_item = None;
    }

    fn on_media(&mut self, timestamp: u64, payload: String) -> Vec<BridgeAction> {
        self.latest_media_timestamp = timestamp;

        if !self.realtime_open {
            trace!(timestamp, "Realtime link not open, dropping caller audio");
            return Vec::new();
        }
        vec![BridgeAction::Realtime(ClientEvent::audio_append(payload))]
    }

    fn on_mark(&mut self) {
        self.mark_queue.pop_front();
    }

    // =========================================================================
    // Voice AI -> Bridge
    // =========================================================================

    /// Apply one event from the voice-AI provider.
    pub fn handle_realtime(&mut self, event: ServerEvent) -> Vec<BridgeAction> {
        match event {
            ServerEvent::AudioDelta { item_id, delta, .. } => self.on_audio_delta(item_id, delta),
            ServerEvent::SpeechStarted { audio_start_ms, .. } => {
                info!(audio_start_ms, "Speech started detected");
                self.on_speech_started()
            }
            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    "Realtime provider error: {}",
                    error.message
                );
                Vec::new()
            }
            ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
                info!(
                    session = %session.id,
                    voice = ?session.voice,
                    input_format = ?session.input_audio_format,
                    "Realtime session acknowledged"
                );
                Vec::new()
            }
            ServerEvent::ResponseCreated { response } => {
                info!(response = %response.id, "Realtime response created");
                self.on_response_created();
                Vec::new()
            }
            event @ (ServerEvent::SpeechStopped { .. }
            | ServerEvent::InputAudioBufferCommitted { .. }
            | ServerEvent::ConversationItemTruncated { .. }
            | ServerEvent::ResponseDone { .. }
            | ServerEvent::ContentPartDone { .. }
            | ServerEvent::AudioDone { .. }
            | ServerEvent::RateLimitsUpdated { .. }) => {
                if event.is_lifecycle() {
                    info!(event = event.event_type(), "Realtime event");
                } else {
                    debug!(event = event.event_type(), "Realtime event");
                }
                Vec::new()
            }
            ServerEvent::Other => {
                trace!("Ignoring unhandled realtime event");
                Vec::new()
            }
        }
    }

    /// A new response owns neither the previous anchor nor its item.
    fn on_response_created(&mut self) {
        self.response_start_timestamp = None;
        self.last_assistant_item = None;
    }

    fn on_audio_delta(&mut self, item_id: Option<String>, delta: String) -> Vec<BridgeAction> {
        let Some(stream_sid) = self.stream_sid.clone() else {
            warn!("Audio delta before stream start, dropping");
            return Vec::new();
        };

        // Audio for a different item starts a new response even when
        // response.created was missed.
        if let (Some(new_item), Some(current)) =
            (item_id.as_deref(), self.last_assistant_item.as_deref())
            && new_item != current
        {
            self.response_start_timestamp = None;
        }

        if self.response_start_timestamp.is_none() {
            self.response_start_timestamp = Some(self.latest_media_timestamp);
            if self.log_timing_math {
                debug!(
                    "Setting start timestamp for new response: {}ms",
                    self.latest_media_timestamp
                );
            }
        }
        if let Some(item_id) = item_id {
            self.last_assistant_item = Some(item_id);
        }

        self.mark_queue.push_back(RESPONSE_MARK_NAME.to_string());
        vec![
            BridgeAction::Telephony(TwilioOutgoing::media(stream_sid.clone(), delta)),
            BridgeAction::Telephony(TwilioOutgoing::response_mark(stream_sid)),
        ]
    }

    fn on_speech_started(&mut self) -> Vec<BridgeAction> {
        let Some(response_start) = self.response_start_timestamp else {
            return Vec::new();
        };
        if self.mark_queue.is_empty() {
            return Vec::new();
        }
        let Some(stream_sid) = self.stream_sid.clone() else {
            return Vec::new();
        };

        let elapsed = self.latest_media_timestamp.saturating_sub(response_start);
        if self.log_timing_math {
            debug!(
                "Calculating elapsed time for truncation: {} - {} = {}ms",
                self.latest_media_timestamp, response_start, elapsed
            );
        }

        let mut actions = Vec::with_capacity(2);
        if let Some(item_id) = self.last_assistant_item.take() {
            if self.log_timing_math {
                debug!("Truncating item with ID: {}, Truncated at: {}ms", item_id, elapsed);
            }
            actions.push(BridgeAction::Realtime(ClientEvent::truncate(item_id, elapsed)));
        }
        actions.push(BridgeAction::Telephony(TwilioOutgoing::clear(stream_sid)));

        self.mark_queue.clear();
        self.last_assistant_item = None;
        self.response_start_timestamp = None;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telephony(json: &str) -> TwilioIncoming {
        TwilioIncoming::parse(json).unwrap()
    }

    fn start(sid: &str) -> TwilioIncoming {
        telephony(&format!(
            r#"{{"event":"start","start":{{"streamSid":"{sid}"}}}}"#
        ))
    }

    fn media(timestamp: u64, payload: &str) -> TwilioIncoming {
        telephony(&format!(
            r#"{{"event":"media","media":{{"timestamp":"{timestamp}","payload":"{payload}"}}}}"#
        ))
    }

    fn mark() -> TwilioIncoming {
        telephony(r#"{"event":"mark","mark":{"name":"responsePart"}}"#)
    }

    fn delta(item_id: Option<&str>, payload: &str) -> ServerEvent {
        ServerEvent::AudioDelta {
            response_id: None,
            item_id: item_id.map(str::to_string),
            delta: payload.to_string(),
        }
    }

    fn speech_started() -> ServerEvent {
        ServerEvent::SpeechStarted {
            audio_start_ms: 0,
            item_id: None,
        }
    }

    fn open_state() -> BridgeState {
        let mut state = BridgeState::new(false);
        state.set_realtime_open(true);
        state
    }

    #[test]
    fn test_media_forwards_payload_and_tracks_timestamp() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));

        for (ts, payload) in [(20, "AAA"), (40, "BBB"), (60, "CCC")] {
            let actions = state.handle_telephony(media(ts, payload));
            assert_eq!(
                actions,
                vec![BridgeAction::Realtime(ClientEvent::audio_append(payload))]
            );
            assert_eq!(state.latest_media_timestamp(), ts);
        }
    }

    #[test]
    fn test_media_dropped_while_realtime_closed() {
        let mut state = BridgeState::new(false);
        state.handle_telephony(start("S1"));

        let actions = state.handle_telephony(media(80, "AAA"));
        assert!(actions.is_empty());
        assert_eq!(state.latest_media_timestamp(), 80);
    }

    #[test]
    fn test_audio_delta_emits_media_then_mark() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));

        for expected_marks in 1..=3 {
            let actions = state.handle_realtime(delta(Some("item_1"), "BBB"));
            assert_eq!(
                actions,
                vec![
                    BridgeAction::Telephony(TwilioOutgoing::media("S1", "BBB")),
                    BridgeAction::Telephony(TwilioOutgoing::response_mark("S1")),
                ]
            );
            assert_eq!(state.pending_marks(), expected_marks);
        }
    }

    #[test]
    fn test_response_start_set_once_per_response() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(100, "AAA"));

        state.handle_realtime(delta(Some("item_1"), "BBB"));
        assert_eq!(state.response_start_timestamp(), Some(100));

        state.handle_telephony(media(300, "AAA"));
        state.handle_realtime(delta(Some("item_1"), "BBB"));
        assert_eq!(state.response_start_timestamp(), Some(100));
    }

    fn response_created(id: &str) -> ServerEvent {
        serde_json::from_str(&format!(
            r#"{{"type":"response.created","response":{{"id":"{id}"}}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_second_response_truncates_from_its_own_start() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(1000, "AAA"));
        state.handle_realtime(delta(Some("A"), "BBB"));
        state.handle_telephony(mark());

        // First response fully played, nothing to interrupt.
        state.handle_telephony(media(10_000, "AAA"));
        assert!(state.handle_realtime(speech_started()).is_empty());

        state.handle_realtime(delta(Some("B"), "BBB"));
        assert_eq!(state.response_start_timestamp(), Some(10_000));
        state.handle_telephony(media(11_000, "AAA"));

        let actions = state.handle_realtime(speech_started());
        assert_eq!(
            actions[0],
            BridgeAction::Realtime(ClientEvent::truncate("B", 1000))
        );
    }

    #[test]
    fn test_response_created_clears_previous_anchor() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(1000, "AAA"));
        state.handle_realtime(delta(Some("A"), "BBB"));
        state.handle_telephony(mark());
        state.handle_telephony(media(10_000, "AAA"));

        assert!(state.handle_realtime(response_created("resp_2")).is_empty());
        assert_eq!(state.response_start_timestamp(), None);
        assert_eq!(state.last_assistant_item(), None);

        // Same item id as before, the anchor still comes from the new response.
        state.handle_realtime(delta(Some("A"), "BBB"));
        state.handle_telephony(media(10_400, "AAA"));
        let actions = state.handle_realtime(speech_started());
        assert_eq!(
            actions[0],
            BridgeAction::Realtime(ClientEvent::truncate("A", 400))
        );
    }

    #[test]
    fn test_delta_item_id_recorded() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));

        state.handle_realtime(delta(None, "BBB"));
        assert_eq!(state.last_assistant_item(), None);

        state.handle_realtime(delta(Some("item_9"), "BBB"));
        assert_eq!(state.last_assistant_item(), Some("item_9"));

        state.handle_realtime(delta(None, "BBB"));
        assert_eq!(state.last_assistant_item(), Some("item_9"));
    }

    #[test]
    fn test_delta_before_start_is_dropped() {
        let mut state = open_state();
        let before = state.clone();

        let actions = state.handle_realtime(delta(Some("item_1"), "BBB"));
        assert!(actions.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_mark_pops_at_most_one() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_realtime(delta(None, "BBB"));
        state.handle_realtime(delta(None, "BBB"));
        assert_eq!(state.pending_marks(), 2);

        assert!(state.handle_telephony(mark()).is_empty());
        assert_eq!(state.pending_marks(), 1);
        state.handle_telephony(mark());
        assert_eq!(state.pending_marks(), 0);
        state.handle_telephony(mark());
        assert_eq!(state.pending_marks(), 0);
    }

    #[test]
    fn test_interruption_truncates_and_clears() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(3000, "AAA"));
        state.handle_realtime(delta(Some("X"), "BBB"));
        state.handle_telephony(media(5000, "AAA"));

        assert_eq!(state.response_start_timestamp(), Some(3000));
        assert_eq!(state.latest_media_timestamp(), 5000);

        let actions = state.handle_realtime(speech_started());
        assert_eq!(
            actions,
            vec![
                BridgeAction::Realtime(ClientEvent::ConversationItemTruncate {
                    item_id: "X".to_string(),
                    content_index: 0,
                    audio_end_ms: 2000,
                }),
                BridgeAction::Telephony(TwilioOutgoing::clear("S1")),
            ]
        );
        assert_eq!(state.pending_marks(), 0);
        assert_eq!(state.last_assistant_item(), None);
        assert_eq!(state.response_start_timestamp(), None);
    }

    #[test]
    fn test_interruption_without_item_only_clears() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(100, "AAA"));
        state.handle_realtime(delta(None, "BBB"));

        let actions = state.handle_realtime(speech_started());
        assert_eq!(
            actions,
            vec![BridgeAction::Telephony(TwilioOutgoing::clear("S1"))]
        );
        assert_eq!(state.pending_marks(), 0);
        assert_eq!(state.response_start_timestamp(), None);
    }

    #[test]
    fn test_interruption_noop_when_marks_drained() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_realtime(delta(Some("X"), "BBB"));
        state.handle_telephony(mark());
        let before = state.clone();

        assert!(state.handle_realtime(speech_started()).is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_interruption_noop_without_response_start() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_realtime(delta(Some("X"), "BBB"));
        // A restarted stream forgets the response start but keeps pending marks.
        state.handle_telephony(start("S2"));
        assert_eq!(state.pending_marks(), 1);
        let before = state.clone();

        assert!(state.handle_realtime(speech_started()).is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_interruption_elapsed_saturates() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(500, "AAA"));
        state.handle_realtime(delta(Some("X"), "BBB"));
        state.latest_media_timestamp = 200;

        let actions = state.handle_realtime(speech_started());
        assert_eq!(
            actions[0],
            BridgeAction::Realtime(ClientEvent::truncate("X", 0))
        );
    }

    #[test]
    fn test_start_resets_timing() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        state.handle_telephony(media(9000, "AAA"));
        state.handle_realtime(delta(Some("X"), "BBB"));

        state.handle_telephony(start("S2"));
        assert_eq!(state.stream_sid(), Some("S2"));
        assert_eq!(state.latest_media_timestamp(), 0);
        assert_eq!(state.response_start_timestamp(), None);
        assert_eq!(state.last_assistant_item(), None);
    }

    #[test]
    fn test_ignored_events_change_nothing() {
        let mut state = open_state();
        state.handle_telephony(start("S1"));
        let before = state.clone();

        for json in [
            r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#,
            r#"{"event":"stop","streamSid":"S1"}"#,
            r#"{"event":"dtmf","dtmf":{"digit":"1"}}"#,
            r#"{"event":"something_new"}"#,
        ] {
            assert!(state.handle_telephony(telephony(json)).is_empty());
        }
        for event in [
            ServerEvent::Other,
            ServerEvent::SpeechStopped {
                audio_end_ms: 10,
                item_id: None,
            },
            ServerEvent::InputAudioBufferCommitted { item_id: None },
        ] {
            assert!(state.handle_realtime(event).is_empty());
        }
        assert_eq!(state, before);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut state = open_state();

        assert!(
            state
                .handle_telephony(telephony(r#"{"event":"start","start":{"streamId":"S1"}}"#))
                .is_empty()
        );
        assert_eq!(
            state.handle_telephony(telephony(
                r#"{"event":"media","media":{"timestamp":100,"payload":"AAA"}}"#
            )),
            vec![BridgeAction::Realtime(ClientEvent::audio_append("AAA"))]
        );

        let actions = state.handle_realtime(delta(None, "BBB"));
        assert_eq!(
            actions,
            vec![
                BridgeAction::Telephony(TwilioOutgoing::media("S1", "BBB")),
                BridgeAction::Telephony(TwilioOutgoing::response_mark("S1")),
            ]
        );
        assert_eq!(state.response_start_timestamp(), Some(100));
    }
}
