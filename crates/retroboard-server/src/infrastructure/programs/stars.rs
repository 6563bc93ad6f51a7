//! Randomly colored stars that fade in and out.
//!
//! Each frame spawns `spawn_rate` stars at random positions.  A star lives for
//! `lifetime` frames and its brightness follows half a sine period, so it
//! fades in, peaks mid-life and fades out.  Setting `seed` makes the sequence
//! reproducible.

use std::f32::consts::PI;
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::Value;
use tracing::warn;

use retroboard_core::{
    DisplaySurface, FrameBuffer, Program, ProgramConfig, ProgramContext, Rgb, RuntimeError,
    SetupError,
};

use super::{count_setting, frame_interval, positive, positive_setting};

pub const NAME: &str = "stars";

const DEFAULT_SPAWN_RATE: u64 = 1;
const DEFAULT_LIFETIME: u64 = 40;
const DEFAULT_FPS: f64 = 60.0;

#[derive(Debug, Clone, Copy)]
struct Star {
    x: i32,
    y: i32,
    color: Rgb,
    age: u64,
}

pub struct Stars {
    config: ProgramConfig,
    width: usize,
    height: usize,
    spawn_rate: u64,
    lifetime: u64,
    interval: Duration,
    rng: StdRng,
    stars: Vec<Star>,
    back: Option<FrameBuffer>,
}

impl Stars {
    pub fn new(context: ProgramContext) -> Self {
        Self {
            config: context.config,
            width: context.width,
            height: context.height,
            spawn_rate: DEFAULT_SPAWN_RATE,
            lifetime: DEFAULT_LIFETIME,
            interval: frame_interval(DEFAULT_FPS),
            rng: StdRng::from_entropy(),
            stars: Vec::new(),
            back: None,
        }
    }

    fn spawn(&mut self) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        for _ in 0..self.spawn_rate {
            let x = self.rng.gen_range(0..self.width);
            let y = self.rng.gen_range(0..self.height);
            let color = Rgb::new(self.rng.gen(), self.rng.gen(), self.rng.gen());
            self.stars.push(Star {
                x: i32::try_from(x).unwrap_or(i32::MAX),
                y: i32::try_from(y).unwrap_or(i32::MAX),
                color,
                age: 0,
            });
        }
    }
}

/// Brightness factor for a star of `age` frames out of `lifetime`.
fn fade(age: u64, lifetime: u64) -> f32 {
    if lifetime == 0 {
        return 0.0;
    }
    (age as f32 / lifetime as f32 * PI).sin().max(0.0)
}

impl Program for Stars {
    fn setup(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), SetupError> {
        self.spawn_rate = count_setting(&self.config, "spawn_rate", DEFAULT_SPAWN_RATE)?;
        self.lifetime = count_setting(&self.config, "lifetime", DEFAULT_LIFETIME)?;
        self.interval = frame_interval(positive_setting(&self.config, "fps", DEFAULT_FPS)?);
        self.rng = match self.config.get("seed") {
            None => StdRng::from_entropy(),
            Some(value) => match value.as_u64() {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => {
                    return Err(SetupError::InvalidConfig {
                        key: "seed".to_string(),
                        reason: "expected a non-negative integer".to_string(),
                    })
                }
            },
        };
        self.stars.clear();
        surface.clear();
        self.back = Some(surface.create_offscreen_buffer());
        Ok(())
    }

    fn advance(&mut self, surface: &mut dyn DisplaySurface) -> Result<(), RuntimeError> {
        let mut frame = self
            .back
            .take()
            .unwrap_or_else(|| surface.create_offscreen_buffer());
        frame.clear();

        self.spawn();
        let lifetime = self.lifetime;
        self.stars.retain_mut(|star| {
            star.age += 1;
            if star.age > lifetime {
                return false;
            }
            frame.set_pixel(star.x, star.y, star.color.scale(fade(star.age, lifetime)));
            true
        });

        self.back = Some(surface.commit(frame));
        Ok(())
    }

    fn config(&self) -> ProgramConfig {
        self.config.clone()
    }

    fn update_config(&mut self, key: &str, value: Value) {
        match key {
            "spawn_rate" => match value.as_u64() {
                Some(rate) => self.spawn_rate = rate,
                None => warn!(key, "ignoring invalid spawn rate"),
            },
            "lifetime" => match value.as_u64() {
                Some(lifetime) => self.lifetime = lifetime,
                None => warn!(key, "ignoring invalid lifetime"),
            },
            "fps" => match positive(&value) {
                Some(fps) => self.interval = frame_interval(fps),
                None => warn!(key, "ignoring non-positive fps"),
            },
            _ => {}
        }
        self.config.insert(key.to_string(), value);
    }

    fn frame_interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroboard_core::{SimulatedSurface, StopHandle};
    use serde_json::json;

    fn stars(pairs: &[(&str, Value)]) -> Stars {
        let (_handle, stop) = StopHandle::pair();
        Stars::new(ProgramContext {
            width: 32,
            height: 16,
            config: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            stop,
        })
    }

    fn run_frames(program: &mut Stars, surface: &mut SimulatedSurface, frames: usize) {
        for _ in 0..frames {
            program.advance(surface).expect("advance");
        }
    }

    #[test]
    fn test_fade_peaks_mid_life() {
        assert_eq!(fade(0, 40), 0.0);
        assert!((fade(20, 40) - 1.0).abs() < 1e-6);
        assert!(fade(40, 40) < 1e-6);
        assert_eq!(fade(3, 0), 0.0);
    }

    #[test]
    fn test_population_is_bounded_by_spawn_rate_times_lifetime() {
        // Arrange
        let mut surface = SimulatedSurface::new(32, 16);
        let mut program = stars(&[
            ("spawn_rate", json!(3)),
            ("lifetime", json!(10)),
            ("seed", json!(7)),
        ]);
        program.setup(&mut surface).expect("setup");

        // Act
        run_frames(&mut program, &mut surface, 50);

        // Assert
        assert_eq!(program.stars.len(), 30);
        assert!(program.stars.iter().all(|s| s.age <= 10));
    }

    #[test]
    fn test_same_seed_draws_same_frames() {
        let mut first_surface = SimulatedSurface::new(32, 16);
        let mut second_surface = SimulatedSurface::new(32, 16);
        let mut first = stars(&[("seed", json!(42))]);
        let mut second = stars(&[("seed", json!(42))]);
        first.setup(&mut first_surface).expect("setup");
        second.setup(&mut second_surface).expect("setup");

        run_frames(&mut first, &mut first_surface, 15);
        run_frames(&mut second, &mut second_surface, 15);

        assert_eq!(first_surface.front(), second_surface.front());
        assert!(first_surface.front().lit_pixels() > 0);
    }

    #[test]
    fn test_spawn_rate_zero_draws_nothing() {
        let mut surface = SimulatedSurface::new(32, 16);
        let mut program = stars(&[("spawn_rate", json!(0))]);
        program.setup(&mut surface).expect("setup");

        run_frames(&mut program, &mut surface, 5);

        assert_eq!(surface.front().lit_pixels(), 0);
    }

    #[test]
    fn test_live_updates() {
        let mut program = stars(&[]);
        program.update_config("spawn_rate", json!(5));
        program.update_config("lifetime", json!("long"));
        program.update_config("fps", json!(25));

        assert_eq!(program.spawn_rate, 5);
        assert_eq!(program.lifetime, DEFAULT_LIFETIME);
        assert_eq!(program.frame_interval(), Duration::from_millis(40));
        assert_eq!(program.config()["lifetime"], json!("long"));
    }

    #[test]
    fn test_invalid_seed_fails_setup() {
        let mut surface = SimulatedSurface::new(32, 16);
        let mut program = stars(&[("seed", json!(-1))]);
        assert!(program.setup(&mut surface).is_err());
    }
}
