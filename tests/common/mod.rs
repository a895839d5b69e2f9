//! Deterministic stand-in for the external training-data generator, plus the fixed
//! payloads used by the end-to-end scenarios.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::OnceLock;
use uba_sentinel::config::DetectorConfig;
use uba_sentinel::features::{EventLogPayload, KeyPress, PointerEvent, ScrollEvent};
use uba_sentinel::storage::ModelBundle;
use uba_sentinel::training::{TrainedModel, Trainer};

const RESOLUTIONS: [&str; 3] = ["1920x1080", "1536x864", "1366x768"];
const KEYS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789@.";

pub struct PayloadGenerator {
    rng: StdRng,
}

impl PayloadGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn key(&mut self) -> String {
        (KEYS[self.rng.gen_range(0..KEYS.len())] as char).to_string()
    }

    /// Human-like session. A single pace factor drives typing, hovering and total time.
    pub fn normal(&mut self) -> EventLogPayload {
        let pace: f64 = self.rng.gen();
        let start = 1_754_000_000_000 + self.rng.gen_range(0..1_000_000_000i64);

        let base = 110.0 + 80.0 * pace;
        let jitter = if self.rng.gen_bool(0.3) {
            0.0
        } else {
            self.rng.gen_range(0.0..30.0)
        };
        let backspace_p = self.rng.gen_range(0.02..0.1);
        let n_keys = self.rng.gen_range(50..=110);
        let mut t = start;
        let mut keys = Vec::with_capacity(n_keys);
        for _ in 0..n_keys {
            let dt = if jitter > 0.0 {
                base + self.rng.gen_range(-jitter..jitter)
            } else {
                base
            };
            t += dt.round() as i64;
            let key = if self.rng.gen_bool(backspace_p) {
                "Backspace".to_string()
            } else {
                self.key()
            };
            keys.push(KeyPress { key, time: t });
        }

        let n_clicks = self.rng.gen_range(3..=8);
        let mut ct = t;
        let clicks = (0..n_clicks)
            .map(|_| {
                ct += self.rng.gen_range(400..2500);
                PointerEvent {
                    x: self.rng.gen_range(300..900),
                    y: self.rng.gen_range(80..500),
                    time: ct,
                    element: "INPUT#email".to_string(),
                }
            })
            .collect();

        let n_hovers = self.rng.gen_range(25..=55);
        let hovers = self.hover_walk(n_hovers, pace, start - 15_000);
        let n_scrolls = self.rng.gen_range(5..=20);
        let scrolls = self.scroll_walk(n_scrolls, start - 8_000);

        EventLogPayload {
            keys_pressed: keys,
            mouse_clicks: clicks,
            mouse_hovers: hovers,
            scroll_events: scrolls,
            paste_events: vec![],
            autofill_detected: vec![],
            time_spent: (25_000.0 + 40_000.0 * pace + self.rng.gen_range(-8_000.0..8_000.0)) as i64,
            screen_resolution: Some(RESOLUTIONS[self.rng.gen_range(0..RESOLUTIONS.len())].to_string()),
        }
    }

    pub fn hover_walk(&mut self, n: usize, pace: f64, start: i64) -> Vec<PointerEvent> {
        let (mut x, mut y, mut t) = (
            self.rng.gen_range(200..1000i64),
            self.rng.gen_range(30..600i64),
            start,
        );
        (0..n)
            .map(|_| {
                x = (x + self.rng.gen_range(-120..=120)).clamp(0, 1900);
                y = (y + self.rng.gen_range(-120..=120)).clamp(0, 1000);
                t += (150.0 + 350.0 * pace + self.rng.gen_range(-60.0..60.0)) as i64;
                PointerEvent {
                    x,
                    y,
                    time: t,
                    element: "DIV.form-container".to_string(),
                }
            })
            .collect()
    }

    pub fn scroll_walk(&mut self, n: usize, start: i64) -> Vec<ScrollEvent> {
        let (mut y, mut t) = (self.rng.gen_range(100.0..400.0), start);
        (0..n)
            .map(|_| {
                t += self.rng.gen_range(200..1500);
                y = f64::max(0.0, y + self.rng.gen_range(-80.0..80.0));
                ScrollEvent { scroll_y: y, time: t }
            })
            .collect()
    }

    /// Scripted session: fast uniform typing, pinpoint clicks, little or no hovering.
    pub fn bot(&mut self) -> EventLogPayload {
        let start = 1_754_000_000_000 + self.rng.gen_range(0..1_000_000_000i64);
        let n_keys = self.rng.gen_range(25..=45);
        let mut t = start;
        let keys = (0..n_keys)
            .map(|_| {
                t += self.rng.gen_range(10..60);
                KeyPress {
                    key: self.key(),
                    time: t,
                }
            })
            .collect();
        let hovers = if self.rng.gen_bool(0.8) {
            vec![]
        } else {
            vec![PointerEvent {
                x: 600,
                y: 200,
                time: t - 500,
                element: "INPUT#email".to_string(),
            }]
        };
        EventLogPayload {
            keys_pressed: keys,
            mouse_clicks: bot_clicks(t),
            mouse_hovers: hovers,
            scroll_events: vec![],
            paste_events: vec![],
            autofill_detected: vec![],
            time_spent: self.rng.gen_range(3_000..12_000),
            screen_resolution: Some("1920x1080".to_string()),
        }
    }

    pub fn normal_batch(&mut self, n: usize) -> Vec<EventLogPayload> {
        (0..n).map(|_| self.normal()).collect()
    }
}

fn bot_clicks(t: i64) -> Vec<PointerEvent> {
    [(612, 138, 50, "INPUT#email"), (708, 211, 100, "INPUT#firstName"), (0, 0, 150, "BUTTON.register-btn")]
        .into_iter()
        .map(|(x, y, dt, el)| PointerEvent {
            x,
            y,
            time: t + dt,
            element: el.to_string(),
        })
        .collect()
}

/// 80 keystrokes 150 ms apart with 4 backspaces, 40 hovers, moderate scrolling, 45 s on page.
pub fn scenario_a() -> EventLogPayload {
    let start = 1_754_328_807_699;
    let keys = (0..80)
        .map(|i| KeyPress {
            key: if i % 20 == 10 { "Backspace".to_string() } else { "a".to_string() },
            time: start + 150 * i,
        })
        .collect();
    let clicks = (0..5)
        .map(|i| PointerEvent {
            x: 500 + 20 * i,
            y: 200 + 30 * i,
            time: start + 12_000 + 1_500 * i,
            element: "INPUT#email".to_string(),
        })
        .collect();
    let mut walk = PayloadGenerator::new(4242);
    let hovers = walk.hover_walk(40, 0.5, start - 15_000);
    let scrolls = (0..12)
        .map(|i| ScrollEvent {
            scroll_y: 250.0 + if i % 2 == 0 { 0.0 } else { 40.0 },
            time: start - 8_000 + 800 * i,
        })
        .collect();
    EventLogPayload {
        keys_pressed: keys,
        mouse_clicks: clicks,
        mouse_hovers: hovers,
        scroll_events: scrolls,
        paste_events: vec![],
        autofill_detected: vec![],
        time_spent: 45_000,
        screen_resolution: Some("1920x1080".to_string()),
    }
}

/// 30 keystrokes exactly 20 ms apart, no corrections, no hovering, 3 s on page.
pub fn scenario_b() -> EventLogPayload {
    let start = 1_754_328_807_699;
    let keys = (0..30)
        .map(|i| KeyPress {
            key: "x".to_string(),
            time: start + 20 * i,
        })
        .collect();
    EventLogPayload {
        keys_pressed: keys,
        mouse_clicks: bot_clicks(start + 600),
        mouse_hovers: vec![],
        scroll_events: vec![],
        paste_events: vec![],
        autofill_detected: vec![],
        time_spent: 3_000,
        screen_resolution: Some("1920x1080".to_string()),
    }
}

pub fn test_config() -> DetectorConfig {
    let mut config = DetectorConfig::default();
    config.training.epochs = 60;
    config.training.seed = Some(7);
    config
}

/// One training run shared by every test in a binary.
pub fn trained() -> &'static TrainedModel {
    static TRAINED: OnceLock<TrainedModel> = OnceLock::new();
    TRAINED.get_or_init(|| {
        let payloads = PayloadGenerator::new(1).normal_batch(800);
        Trainer::new(&test_config())
            .train_payloads(&payloads)
            .expect("training on generated normal data")
    })
}

pub fn trained_bundle() -> ModelBundle {
    trained().bundle.clone()
}
