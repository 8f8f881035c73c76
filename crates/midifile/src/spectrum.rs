use crate::event::{EventKind, Smf};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A sounding note in absolute ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrumNote {
    pub start_tick: u64,
    pub end_tick: u64,
    pub key: u8,
}

/// Pitch-over-time outline of a document, for drawing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spectrum {
    pub notes: Vec<SpectrumNote>,
    pub min_key: Option<u8>,
    pub max_key: Option<u8>,
    /// Length of the longest track in ticks.
    pub total_ticks: u64,
}

impl Spectrum {
    /// Pair note-ons with note-offs per `(channel, key)`.
    ///
    /// A note-on with velocity 0 closes a note. Notes left open at the end of
    /// a track are closed at the track's last tick.
    pub fn from_smf(smf: &Smf) -> Self {
        let mut notes = Vec::new();
        let mut total_ticks = 0;

        for track in &smf.tracks {
            let mut tick: u64 = 0;
            // (channel, key) -> onset ticks, stacked for overlapping repeats
            let mut pending: HashMap<(u8, u8), Vec<u64>> = HashMap::new();

            for event in &track.events {
                tick += event.delta as u64;
                match event.kind {
                    EventKind::NoteOn { channel, key, velocity } if velocity > 0 => {
                        pending.entry((channel, key)).or_default().push(tick);
                    }
                    EventKind::NoteOn { channel, key, .. } | EventKind::NoteOff { channel, key, .. } => {
                        if let Some(start_tick) =
                            pending.get_mut(&(channel, key)).and_then(|starts| starts.pop())
                        {
                            notes.push(SpectrumNote {
                                start_tick,
                                end_tick: tick,
                                key,
                            });
                        }
                    }
                    _ => {}
                }
            }

            for ((_, key), starts) in pending {
                for start_tick in starts {
                    notes.push(SpectrumNote {
                        start_tick,
                        end_tick: tick,
                        key,
                    });
                }
            }
            total_ticks = total_ticks.max(tick);
        }

        notes.sort_by_key(|n| (n.start_tick, n.key));

        Self {
            min_key: notes.iter().map(|n| n.key).min(),
            max_key: notes.iter().map(|n| n.key).max(),
            notes,
            total_ticks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

impl Smf {
    pub fn spectrum(&self) -> Spectrum {
        Spectrum::from_smf(self)
    }
}
