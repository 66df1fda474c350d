use std::sync::Arc;

use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Consumer, Producer, Split},
};

use super::{MAX_QUANTUM, Parameter, SynthGraph, interleave};
use crate::events::{RawMessage, TimedEvent};
use crate::timing::{SampleClock, Scheduler, StartOutcome};
use crate::tracker::{CombinationTones, PitchTracker};

const COMMAND_CAPACITY: usize = 256;
const NOTIFICATION_CAPACITY: usize = 64;
const TONES_CAPACITY: usize = 1024;

/// Control -> render.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    Load(Arc<[TimedEvent]>),
    Start,
    Stop,
    SetParameter(Parameter, f64),
    /// Channels must already be validated.
    SetChannels(u8, u8),
    Message(RawMessage),
}

/// Render -> control.
#[derive(Debug, Clone)]
pub enum RenderNotification {
    PlaybackFinished,
    StartIgnored(StartOutcome),
    /// An event list the renderer no longer references. Dropping it here,
    /// on the control side, keeps deallocation off the audio thread.
    Retired(Arc<[TimedEvent]>),
    Tones(CombinationTones),
}

/// Control-side end of the renderer's queues.
pub struct RenderLink {
    commands: HeapProd<RenderCommand>,
    notifications: HeapCons<RenderNotification>,
    tones: HeapCons<CombinationTones>,
}

impl RenderLink {
    /// Queues a command for the next quantum. Hands the command back if
    /// the queue is full.
    pub fn send(&mut self, command: RenderCommand) -> Result<(), RenderCommand> {
        self.commands.try_push(command)
    }

    /// Next pending notification, if any. Tone updates come after other
    /// notifications.
    pub fn poll(&mut self) -> Option<RenderNotification> {
        self.notifications
            .try_pop()
            .or_else(|| self.tones.try_pop().map(RenderNotification::Tones))
    }
}

/// Everything that runs inside the audio callback: command intake,
/// scheduling, pitch tracking and the synth graph. Nothing here blocks,
/// logs or allocates once constructed.
pub struct Renderer {
    commands: HeapCons<RenderCommand>,
    notifications: HeapProd<RenderNotification>,
    scheduler: Scheduler,
    tracker: PitchTracker,
    graph: SynthGraph,
    clock: SampleClock,
    /// A replaced list that did not fit in the notification queue. Further
    /// loads wait in the command queue until it has been handed back.
    pending_retire: Option<Arc<[TimedEvent]>>,
    left: [f32; MAX_QUANTUM],
    right: [f32; MAX_QUANTUM],
}

impl Renderer {
    /// Wires the tracker's outputs to the graph's carrier frequencies and
    /// returns the renderer with its control link.
    pub fn new(graph: SynthGraph, mut tracker: PitchTracker, sample_rate: f64) -> (Self, RenderLink) {
        let (command_tx, command_rx) = HeapRb::<RenderCommand>::new(COMMAND_CAPACITY).split();
        let (notify_tx, notify_rx) =
            HeapRb::<RenderNotification>::new(NOTIFICATION_CAPACITY).split();
        let (mut tones_tx, tones_rx) = HeapRb::<CombinationTones>::new(TONES_CAPACITY).split();

        let (frequency_a, frequency_b) = graph.frequency_sinks();
        tracker.set_destination_a(Some(Box::new(frequency_a)));
        tracker.set_destination_b(Some(Box::new(frequency_b)));
        tracker.subscribe(move |tones| {
            let _ = tones_tx.try_push(tones);
        });

        let renderer = Self {
            commands: command_rx,
            notifications: notify_tx,
            scheduler: Scheduler::new(),
            tracker,
            graph,
            clock: SampleClock::new(sample_rate),
            pending_retire: None,
            left: [0.0; MAX_QUANTUM],
            right: [0.0; MAX_QUANTUM],
        };
        let link = RenderLink {
            commands: command_tx,
            notifications: notify_rx,
            tones: tones_rx,
        };
        (renderer, link)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn graph(&self) -> &SynthGraph {
        &self.graph
    }

    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    /// Fills an interleaved output buffer, one quantum at a time.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for chunk in data.chunks_mut(MAX_QUANTUM * channels) {
            let frames = chunk.len() / channels;
            self.process_quantum(frames);
            interleave(&self.left[..frames], &self.right[..frames], chunk, channels);
        }
    }

    /// Renders `frames` (at most `MAX_QUANTUM`) into the internal left and
    /// right buffers.
    pub fn process_quantum(&mut self, frames: usize) -> (&[f32], &[f32]) {
        let frames = frames.min(MAX_QUANTUM);
        self.drain_commands();

        let outcome = self.scheduler.process_quantum(&self.clock, &mut self.tracker);
        if outcome.finished {
            self.notify(RenderNotification::PlaybackFinished);
        }

        self.graph
            .render(&mut self.left[..frames], &mut self.right[..frames]);
        self.clock.advance(frames as u64);
        (&self.left[..frames], &self.right[..frames])
    }

    fn drain_commands(&mut self) {
        if let Some(events) = self.pending_retire.take() {
            self.retire(events);
        }
        while let Some(next) = self.commands.try_peek() {
            if matches!(next, RenderCommand::Load(_)) && self.pending_retire.is_some() {
                break;
            }
            let Some(command) = self.commands.try_pop() else {
                break;
            };
            match command {
                RenderCommand::Load(events) => {
                    if let Some(old) = self.scheduler.load(events) {
                        self.retire(old);
                    }
                }
                RenderCommand::Start => match self.scheduler.start(&self.clock) {
                    StartOutcome::Started => self.tracker.reset(),
                    ignored => self.notify(RenderNotification::StartIgnored(ignored)),
                },
                RenderCommand::Stop => {
                    self.scheduler.stop();
                }
                RenderCommand::SetParameter(parameter, value) => {
                    self.graph.set_parameter(parameter, value);
                }
                RenderCommand::SetChannels(a, b) => {
                    let _ = self.tracker.set_channels(a, b);
                }
                RenderCommand::Message(message) => {
                    self.tracker.receive(message.as_bytes());
                }
            }
        }
    }

    fn retire(&mut self, events: Arc<[TimedEvent]>) {
        if let Err(RenderNotification::Retired(events)) =
            self.notifications.try_push(RenderNotification::Retired(events))
        {
            self.pending_retire = Some(events);
        }
    }

    fn notify(&mut self, notification: RenderNotification) {
        let _ = self.notifications.try_push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthConfig;
    use crate::timing::PlaybackState;
    use crate::tuning::{self, Tuning};
    use approx::assert_relative_eq;

    const SAMPLE_RATE: f64 = 48_000.0;

    fn renderer() -> (Renderer, RenderLink) {
        let config = SynthConfig::default();
        let graph = SynthGraph::new(&config, SAMPLE_RATE);
        let tracker = PitchTracker::new(1, 0, tuning::shared(Tuning::default())).unwrap();
        Renderer::new(graph, tracker, SAMPLE_RATE)
    }

    fn note(time_seconds: f64, status: u8, pitch: u8) -> TimedEvent {
        TimedEvent {
            time_seconds,
            tick: 0,
            track: 0,
            message: vec![status, pitch, 100],
        }
    }

    fn drain(link: &mut RenderLink) -> Vec<RenderNotification> {
        std::iter::from_fn(|| link.poll()).collect()
    }

    #[test]
    fn plays_score_and_reports_finish_once() {
        let (mut renderer, mut link) = renderer();
        let events: Arc<[TimedEvent]> = vec![note(0.0, 0x91, 69), note(0.01, 0x90, 57)].into();
        link.send(RenderCommand::Load(events)).unwrap();
        link.send(RenderCommand::Start).unwrap();

        renderer.process_quantum(MAX_QUANTUM);
        assert_eq!(renderer.scheduler().state(), PlaybackState::Playing);
        for _ in 0..10 {
            renderer.process_quantum(MAX_QUANTUM);
        }
        assert_eq!(renderer.scheduler().state(), PlaybackState::Loaded);

        let notes = drain(&mut link);
        let finished = notes
            .iter()
            .filter(|n| matches!(n, RenderNotification::PlaybackFinished))
            .count();
        assert_eq!(finished, 1);

        let tones = notes
            .iter()
            .find_map(|n| match n {
                RenderNotification::Tones(t) => Some(*t),
                _ => None,
            })
            .unwrap();
        assert_relative_eq!(tones.f1, 660.0);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 660.0);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyB).get(), 1100.0);
    }

    #[test]
    fn start_without_score_is_reported() {
        let (mut renderer, mut link) = renderer();
        link.send(RenderCommand::Start).unwrap();
        renderer.process_quantum(16);
        assert!(matches!(
            drain(&mut link).as_slice(),
            [RenderNotification::StartIgnored(StartOutcome::NothingLoaded)]
        ));
    }

    #[test]
    fn replaced_list_is_handed_back() {
        let (mut renderer, mut link) = renderer();
        let first: Arc<[TimedEvent]> = vec![note(0.0, 0x91, 60)].into();
        link.send(RenderCommand::Load(first.clone())).unwrap();
        link.send(RenderCommand::Load(vec![note(0.0, 0x91, 61)].into()))
            .unwrap();
        renderer.process_quantum(16);

        match drain(&mut link).as_slice() {
            [RenderNotification::Retired(old)] => assert!(Arc::ptr_eq(old, &first)),
            other => panic!("unexpected notifications: {other:?}"),
        }
    }

    #[test]
    fn retired_list_waits_for_room() {
        let (mut renderer, mut link) = renderer();
        for _ in 0..NOTIFICATION_CAPACITY {
            link.send(RenderCommand::Start).unwrap();
        }
        let first: Arc<[TimedEvent]> = vec![note(0.0, 0x91, 60)].into();
        let second: Arc<[TimedEvent]> = vec![note(0.0, 0x91, 61)].into();
        link.send(RenderCommand::Load(first.clone())).unwrap();
        link.send(RenderCommand::Load(second.clone())).unwrap();
        link.send(RenderCommand::Load(vec![note(0.0, 0x91, 62)].into()))
            .unwrap();

        renderer.process_quantum(16);
        assert_eq!(Arc::strong_count(&first), 2);
        assert_eq!(drain(&mut link).len(), NOTIFICATION_CAPACITY);

        renderer.process_quantum(16);
        let retired: Vec<_> = drain(&mut link)
            .into_iter()
            .filter_map(|n| match n {
                RenderNotification::Retired(events) => Some(events),
                _ => None,
            })
            .collect();
        assert_eq!(retired.len(), 2);
        assert!(Arc::ptr_eq(&retired[0], &first));
        assert!(Arc::ptr_eq(&retired[1], &second));
    }

    #[test]
    fn replay_after_finish_recomputes_tones() {
        let (mut renderer, mut link) = renderer();
        let events: Arc<[TimedEvent]> = vec![note(0.0, 0x91, 69), note(0.0, 0x90, 57)].into();
        link.send(RenderCommand::Load(events.clone())).unwrap();
        link.send(RenderCommand::Start).unwrap();
        renderer.process_quantum(MAX_QUANTUM);
        assert_eq!(renderer.scheduler().state(), PlaybackState::Loaded);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 660.0);

        link.send(RenderCommand::SetParameter(Parameter::FrequencyA, 0.0))
            .unwrap();
        link.send(RenderCommand::SetParameter(Parameter::FrequencyB, 0.0))
            .unwrap();
        renderer.process_quantum(MAX_QUANTUM);
        assert_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 0.0);

        link.send(RenderCommand::Load(events)).unwrap();
        link.send(RenderCommand::Start).unwrap();
        renderer.process_quantum(MAX_QUANTUM);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 660.0);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyB).get(), 1100.0);
    }

    #[test]
    fn live_messages_reach_tracker() {
        let (mut renderer, mut link) = renderer();
        for bytes in [[0x91, 69, 100], [0x90, 69, 100]] {
            link.send(RenderCommand::Message(RawMessage::new(&bytes).unwrap()))
                .unwrap();
        }
        renderer.process_quantum(16);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 880.0);

        link.send(RenderCommand::SetChannels(2, 3)).unwrap();
        renderer.process_quantum(16);
        assert_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 0.0);
    }

    #[test]
    fn render_interleaves_partial_quanta() {
        let (mut renderer, _link) = renderer();
        let mut data = vec![1.0f32; 300 * 2];
        renderer.render(&mut data, 2);
        assert_eq!(renderer.clock().frames(), 300);
        assert!(data.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn parsed_score_drives_carriers() {
        use crate::midi::{self, fixtures};

        let track = [
            fixtures::tempo(0, 250_000),
            fixtures::event(0, &[0x91, 69, 100]),
            fixtures::event(0, &[0x90, 57, 100]),
            fixtures::end_of_track(96),
        ]
        .concat();
        let score = midi::parse(&fixtures::smf(0, 96, &[track])).unwrap();
        assert_relative_eq!(score.duration_seconds(), 0.25);

        let (mut renderer, mut link) = renderer();
        link.send(RenderCommand::Load(score.events.into())).unwrap();
        link.send(RenderCommand::Start).unwrap();
        renderer.process_quantum(MAX_QUANTUM);
        let mut quanta: usize = 1;
        while renderer.scheduler().state() == PlaybackState::Playing && quanta < 1000 {
            renderer.process_quantum(MAX_QUANTUM);
            quanta += 1;
        }

        let expected = (0.25 * SAMPLE_RATE / MAX_QUANTUM as f64).ceil() as usize;
        assert!(quanta.abs_diff(expected) <= 1, "finished after {quanta} quanta");
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyA).get(), 660.0);
        assert_relative_eq!(renderer.graph().control(Parameter::FrequencyB).get(), 1100.0);
    }
}
