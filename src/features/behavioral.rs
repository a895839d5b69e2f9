//! Interaction statistics over one event log.

use super::payload::EventLogPayload;
use super::FEATURE_DIM;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Derived statistics in named form. Interval and distance statistics fall back
/// to 0 when the source sequence has fewer than two events; counts are always real.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehavioralStats {
    /// Keystrokes: consecutive time deltas (ms)
    pub key_interval_mean: f64,
    pub key_interval_std: f64,
    pub key_interval_median: f64,
    pub backspace_ratio: f64,
    pub key_count: u32,
    /// Clicks
    pub click_interval_mean: f64,
    pub click_count: u32,
    /// Hovers: euclidean step distance (px), step interval (ms), speed (px/ms)
    pub hover_distance_mean: f64,
    pub hover_distance_std: f64,
    pub hover_count: u32,
    pub hover_interval_mean: f64,
    pub hover_speed_mean: f64,
    /// Scroll: |ΔscrollY| / Δt over steps with Δt > 0
    pub scroll_speed_mean: f64,
    pub scroll_count: u32,
    pub time_spent_secs: f64,
    pub paste_count: u32,
    pub autofill_count: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl BehavioralStats {
    pub fn from_payload(p: &EventLogPayload) -> Result<Self> {
        let (screen_width, screen_height) = p.screen_dimensions()?;
        let mut s = BehavioralStats {
            key_count: p.keys_pressed.len() as u32,
            click_count: p.mouse_clicks.len() as u32,
            hover_count: p.mouse_hovers.len() as u32,
            scroll_count: p.scroll_events.len() as u32,
            time_spent_secs: p.time_spent as f64 / 1000.0,
            paste_count: p.paste_events.len() as u32,
            autofill_count: p.autofill_detected.len() as u32,
            screen_width,
            screen_height,
            ..Default::default()
        };

        let keys = &p.keys_pressed;
        if keys.len() > 1 {
            let intervals = deltas(keys.iter().map(|k| k.time));
            s.key_interval_mean = mean(&intervals);
            s.key_interval_std = std_dev(&intervals);
            s.key_interval_median = median(&intervals);
            let backspaces = keys.iter().filter(|k| k.key == "Backspace").count();
            s.backspace_ratio = backspaces as f64 / keys.len() as f64;
        }

        let clicks = &p.mouse_clicks;
        if clicks.len() > 1 {
            s.click_interval_mean = mean(&deltas(clicks.iter().map(|c| c.time)));
        }

        let hovers = &p.mouse_hovers;
        if hovers.len() > 1 {
            let mut distances = Vec::with_capacity(hovers.len() - 1);
            let mut intervals = Vec::with_capacity(hovers.len() - 1);
            let mut speeds = Vec::new();
            for pair in hovers.windows(2) {
                let dx = pair[1].x as f64 - pair[0].x as f64;
                let dy = pair[1].y as f64 - pair[0].y as f64;
                let dist = dx.hypot(dy);
                let dt = pair[1].time as f64 - pair[0].time as f64;
                distances.push(dist);
                intervals.push(dt);
                if dt > 0.0 {
                    speeds.push(dist / dt);
                }
            }
            s.hover_distance_mean = mean(&distances);
            s.hover_distance_std = std_dev(&distances);
            s.hover_interval_mean = mean(&intervals);
            s.hover_speed_mean = mean(&speeds);
        }

        let scrolls = &p.scroll_events;
        if scrolls.len() > 1 {
            let speeds: Vec<f64> = scrolls
                .windows(2)
                .filter_map(|pair| {
                    let dt = pair[1].time as f64 - pair[0].time as f64;
                    (dt > 0.0).then(|| (pair[1].scroll_y - pair[0].scroll_y).abs() / dt)
                })
                .collect();
            s.scroll_speed_mean = mean(&speeds);
        }

        Ok(s)
    }

    /// Encode in slot order (see [`super::FEATURE_NAMES`]).
    pub fn to_vector(&self) -> Vec<f64> {
        let out = vec![
            self.key_interval_mean,
            self.key_interval_std,
            self.backspace_ratio,
            self.key_count as f64,
            self.key_interval_median,
            self.click_interval_mean,
            self.click_count as f64,
            self.hover_distance_mean,
            self.hover_distance_std,
            self.hover_count as f64,
            self.hover_interval_mean,
            self.hover_speed_mean,
            self.scroll_speed_mean,
            self.scroll_count as f64,
            self.time_spent_secs,
            self.paste_count as f64,
            self.autofill_count as f64,
            self.screen_width as f64,
            self.screen_height as f64,
        ];
        debug_assert_eq!(out.len(), FEATURE_DIM);
        out
    }
}

/// Consecutive differences in sequence order, computed in f64.
fn deltas(times: impl Iterator<Item = i64>) -> Vec<f64> {
    let times: Vec<f64> = times.map(|t| t as f64).collect();
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population standard deviation.
fn std_dev(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
