use serde::{Deserialize, Serialize};

/// 旁白语速（词/秒）
pub const WORDS_PER_SECOND: f64 = 2.3;

/// 由总时长与分镜数量推算出的节奏
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pacing {
    pub seconds_per_scene: f64,
    pub word_budget: usize,
}

impl Pacing {
    pub fn new(total_seconds: f64, scene_count: usize) -> Self {
        let total_seconds = total_seconds.max(0.0);
        Self {
            seconds_per_scene: total_seconds / scene_count.max(1) as f64,
            word_budget: (total_seconds * WORDS_PER_SECOND).round() as usize,
        }
    }

    /// 每个分镜分到的旁白词数
    pub fn words_per_scene(&self, scene_count: usize) -> usize {
        (self.word_budget / scene_count.max(1)).max(1)
    }
}

/// 将总时长平均切分给每个分镜
pub fn split_duration(total_seconds: f64, scene_count: usize) -> Vec<f64> {
    if scene_count == 0 {
        return Vec::new();
    }
    let each = total_seconds / scene_count as f64;
    vec![each; scene_count]
}
