//! Avatar frames and what the kiosk shows for each interaction state
//!
//! Frame 0 is the resting face. Frames 1..=9 open the mouth progressively;
//! while EcoBot speaks the frame ping-pongs across that range on every tick,
//! or jumps to a random frame when the synthesizer reports a word boundary.

use rand::Rng;
use serde::Serialize;

/// Highest mouth frame index
pub const LAST_FRAME: u8 = 9;

/// One avatar image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AvatarFrame(u8);

impl AvatarFrame {
    pub const REST: Self = Self(0);

    pub fn new(index: u8) -> Option<Self> {
        (index <= LAST_FRAME).then_some(Self(index))
    }

    /// A random open-mouth frame
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen_range(1..=LAST_FRAME))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn image_path(self) -> String {
        format!("/assets/frames/{}.svg", self.0)
    }
}

/// Every frame image, for preloading
pub fn frame_paths() -> Vec<String> {
    (0..=LAST_FRAME).map(|i| AvatarFrame(i).image_path()).collect()
}

/// Ping-pong cursor over the mouth frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouthAnimation {
    frame: u8,
    ascending: bool,
}

impl MouthAnimation {
    pub fn start() -> Self {
        Self {
            frame: 1,
            ascending: true,
        }
    }

    pub fn frame(self) -> AvatarFrame {
        AvatarFrame(self.frame)
    }

    #[must_use]
    pub fn advance(self) -> Self {
        if self.ascending {
            let frame = self.frame + 1;
            Self {
                frame,
                ascending: frame < LAST_FRAME,
            }
        } else {
            let frame = self.frame - 1;
            Self {
                frame,
                ascending: frame <= 1,
            }
        }
    }

    /// Show `frame` next; the resting frame is shown as the least-open mouth
    #[must_use]
    pub fn jump_to(self, frame: AvatarFrame) -> Self {
        let frame = frame.0.clamp(1, LAST_FRAME);
        let ascending = match frame {
            1 => true,
            LAST_FRAME => false,
            _ => self.ascending,
        };
        Self { frame, ascending }
    }
}

/// Visual accent of the status pill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Accent {
    Recording,
    Talking,
}

/// Everything the kiosk page needs to render one state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateView {
    pub state: &'static str,
    pub label: &'static str,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<Accent>,
}
