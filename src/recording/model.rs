use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::capture::PalettedFrame;
use crate::combat_log::CombatLogFile;
use crate::encoding::LootRecord;

pub(crate) const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecorderState {
    Stopped,
    AwaitingInitialLoot,
    Running,
}

/// Operator-entered strength of the run's weather effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WeatherStrength {
    Thirty,
    Fifty,
    Seventy,
}

impl WeatherStrength {
    pub fn percent(self) -> i32 {
        match self {
            WeatherStrength::Thirty => 30,
            WeatherStrength::Fifty => 50,
            WeatherStrength::Seventy => 70,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStatus {
    pub state: RecorderState,
    pub frame_count: usize,
    pub loot_record_count: usize,
    pub weather_strength: Option<WeatherStrength>,
    pub tracked_characters: Vec<String>,
    pub recording_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// Stop arrived before any frame was buffered; nothing was written.
    NothingCaptured,
    Recorded {
        path: PathBuf,
        frame_count: usize,
        loot_record_count: usize,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LootOutcome {
    Baseline,
    Appended { frame: i32 },
    Discarded,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum FrameOutcome {
    Buffered { weather_reminder: bool },
    Discarded,
}

/// Everything a stopped session hands over for encoding.
pub(crate) struct FinishedSession {
    pub(crate) frames: Vec<PalettedFrame>,
    pub(crate) delays: Vec<u16>,
    pub(crate) loot_records: Vec<LootRecord>,
    pub(crate) tracked_characters: BTreeMap<String, CombatLogFile>,
    pub(crate) weather_strength: Option<WeatherStrength>,
    pub(crate) recording_path: PathBuf,
}

pub(crate) struct Session {
    state: RecorderState,
    frames: Vec<PalettedFrame>,
    delays: Vec<u16>,
    loot_records: Vec<LootRecord>,
    tracked_characters: BTreeMap<String, CombatLogFile>,
    weather_strength: Option<WeatherStrength>,
    recording_path: Option<PathBuf>,
    frame_delay: u16,
    weather_reminder_interval: usize,
    next_weather_reminder_at: usize,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            state: RecorderState::Stopped,
            frames: Vec::new(),
            delays: Vec::new(),
            loot_records: Vec::new(),
            tracked_characters: BTreeMap::new(),
            weather_strength: None,
            recording_path: None,
            frame_delay: 0,
            weather_reminder_interval: usize::MAX,
            next_weather_reminder_at: usize::MAX,
        }
    }

    pub(crate) fn state(&self) -> RecorderState {
        self.state
    }

    pub(crate) fn begin(
        &mut self,
        tracked_characters: BTreeMap<String, CombatLogFile>,
        recording_path: PathBuf,
        frame_delay: u16,
        weather_reminder_interval: usize,
    ) {
        let weather_reminder_interval = if weather_reminder_interval == 0 {
            usize::MAX
        } else {
            weather_reminder_interval
        };

        self.frames = Vec::new();
        self.delays = Vec::new();
        self.loot_records = Vec::new();
        self.tracked_characters = tracked_characters;
        self.weather_strength = None;
        self.recording_path = Some(recording_path);
        self.frame_delay = frame_delay;
        self.weather_reminder_interval = weather_reminder_interval;
        self.next_weather_reminder_at = weather_reminder_interval;
        self.state = RecorderState::AwaitingInitialLoot;
    }

    pub(crate) fn accept_loot(&mut self, clipboard_text: String) -> LootOutcome {
        match self.state {
            RecorderState::Stopped => LootOutcome::Discarded,
            RecorderState::AwaitingInitialLoot => {
                self.loot_records.push(LootRecord {
                    frame: 0,
                    loot: clipboard_text,
                });
                self.state = RecorderState::Running;
                LootOutcome::Baseline
            }
            RecorderState::Running => {
                // -1 when no frame has been buffered yet.
                let frame = i32::try_from(self.frames.len()).map_or(i32::MAX, |count| count - 1);
                self.loot_records.push(LootRecord {
                    frame,
                    loot: clipboard_text,
                });
                LootOutcome::Appended { frame }
            }
        }
    }

    pub(crate) fn accept_frame(&mut self, frame: PalettedFrame) -> FrameOutcome {
        if self.state != RecorderState::Running {
            return FrameOutcome::Discarded;
        }

        self.frames.push(frame);
        self.delays.push(self.frame_delay);
        debug_assert_eq!(self.frames.len(), self.delays.len());

        let mut weather_reminder = false;
        if self.frames.len() >= self.next_weather_reminder_at {
            self.next_weather_reminder_at = self
                .next_weather_reminder_at
                .saturating_add(self.weather_reminder_interval);
            weather_reminder = self.weather_strength.is_none();
        }

        FrameOutcome::Buffered { weather_reminder }
    }

    /// Applies the weather tier once per session, only while running.
    pub(crate) fn set_weather_strength(&mut self, strength: WeatherStrength) -> bool {
        if self.state != RecorderState::Running || self.weather_strength.is_some() {
            return false;
        }

        self.weather_strength = Some(strength);
        true
    }

    pub(crate) fn finish(&mut self) -> FinishedSession {
        self.state = RecorderState::Stopped;
        self.next_weather_reminder_at = usize::MAX;

        FinishedSession {
            frames: std::mem::take(&mut self.frames),
            delays: std::mem::take(&mut self.delays),
            loot_records: std::mem::take(&mut self.loot_records),
            tracked_characters: std::mem::take(&mut self.tracked_characters),
            weather_strength: self.weather_strength.take(),
            recording_path: self.recording_path.take().unwrap_or_default(),
        }
    }

    pub(crate) fn status(&self) -> RecorderStatus {
        RecorderStatus {
            state: self.state,
            frame_count: self.frames.len(),
            loot_record_count: self.loot_records.len(),
            weather_strength: self.weather_strength,
            tracked_characters: self.tracked_characters.keys().cloned().collect(),
            recording_path: self.recording_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameOutcome, LootOutcome, RecorderState, Session, WeatherStrength};
    use crate::capture::PalettedFrame;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn frame() -> PalettedFrame {
        PalettedFrame::new(2, 2, vec![0, 1, 1, 0]).expect("Expected test frame to build")
    }

    fn running_session(reminder_interval: usize) -> Session {
        let mut session = Session::new();
        session.begin(
            BTreeMap::new(),
            PathBuf::from("run.abyss"),
            10,
            reminder_interval,
        );
        assert_eq!(session.accept_loot("baseline".to_string()), LootOutcome::Baseline);
        session
    }

    #[test]
    fn stopped_session_discards_loot_and_frames() {
        let mut session = Session::new();

        assert_eq!(session.accept_loot("cargo".to_string()), LootOutcome::Discarded);
        assert_eq!(session.accept_frame(frame()), FrameOutcome::Discarded);
        assert_eq!(session.status().loot_record_count, 0);
        assert_eq!(session.status().frame_count, 0);
        assert_eq!(session.state(), RecorderState::Stopped);
    }

    #[test]
    fn first_loot_is_baseline_then_loot_tracks_latest_frame() {
        let mut session = Session::new();
        session.begin(BTreeMap::new(), PathBuf::from("run.abyss"), 10, 180);
        assert_eq!(session.state(), RecorderState::AwaitingInitialLoot);

        assert_eq!(
            session.accept_frame(frame()),
            FrameOutcome::Discarded,
            "Frames before the baseline loot are not part of the run"
        );

        assert_eq!(session.accept_loot("baseline".to_string()), LootOutcome::Baseline);
        assert_eq!(session.state(), RecorderState::Running);

        assert_eq!(
            session.accept_loot("before any frame".to_string()),
            LootOutcome::Appended { frame: -1 }
        );

        for _ in 0..5 {
            session.accept_frame(frame());
        }
        assert_eq!(
            session.accept_loot("after five frames".to_string()),
            LootOutcome::Appended { frame: 4 }
        );

        let finished = session.finish();
        let frames: Vec<i32> = finished.loot_records.iter().map(|record| record.frame).collect();
        assert_eq!(frames, vec![0, -1, 4]);
        assert_eq!(finished.loot_records[0].loot, "baseline");
    }

    #[test]
    fn delays_stay_aligned_with_frames() {
        let mut session = running_session(180);

        for expected in 1..=20 {
            session.accept_frame(frame());
            let status = session.status();
            assert_eq!(status.frame_count, expected);
        }

        let finished = session.finish();
        assert_eq!(finished.frames.len(), finished.delays.len());
        assert!(finished.delays.iter().all(|delay| *delay == 10));
    }

    #[test]
    fn weather_reminder_fires_once_per_interval_while_unset() {
        let mut session = running_session(3);

        let reminders: Vec<usize> = (1..=9)
            .filter(|_| {
                matches!(
                    session.accept_frame(frame()),
                    FrameOutcome::Buffered {
                        weather_reminder: true
                    }
                )
            })
            .collect();
        assert_eq!(reminders, vec![3, 6, 9]);

        assert!(session.set_weather_strength(WeatherStrength::Seventy));
        for _ in 0..6 {
            assert_eq!(
                session.accept_frame(frame()),
                FrameOutcome::Buffered {
                    weather_reminder: false
                }
            );
        }
    }

    #[test]
    fn weather_strength_is_set_once_and_only_while_running() {
        let mut session = Session::new();
        assert!(!session.set_weather_strength(WeatherStrength::Thirty));

        session.begin(BTreeMap::new(), PathBuf::from("run.abyss"), 10, 180);
        assert!(!session.set_weather_strength(WeatherStrength::Thirty));

        session.accept_loot("baseline".to_string());
        assert!(session.set_weather_strength(WeatherStrength::Fifty));
        assert!(!session.set_weather_strength(WeatherStrength::Seventy));
        assert_eq!(session.status().weather_strength, Some(WeatherStrength::Fifty));
    }

    #[test]
    fn begin_resets_previous_session_buffers() {
        let mut session = running_session(180);
        session.accept_frame(frame());
        session.set_weather_strength(WeatherStrength::Thirty);
        session.finish();

        session.begin(BTreeMap::new(), PathBuf::from("next.abyss"), 10, 180);
        let status = session.status();
        assert_eq!(status.frame_count, 0);
        assert_eq!(status.loot_record_count, 0);
        assert_eq!(status.weather_strength, None);
        assert_eq!(status.recording_path, Some(PathBuf::from("next.abyss")));
    }
}
