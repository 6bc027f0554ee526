use crate::models::{
    traits::IAgent,
    common::{Position3D, Velocity3D},
    rgv_track::RgvId,
};

/// RGVの移動区間（一定速度で指定時間移動）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub velocity: Velocity3D,
    pub duration: f64,
}

/// 地上目標（RGV）の真値モデル
///
/// 開始位置から移動区間を順に消化し、すべて終えた後は停止し続けます。
/// シミュレーションでカメラ画像上のブロブを合成するための真値です。
#[derive(Debug, Clone)]
pub struct GroundTarget {
    pub id: RgvId,
    pub position: Position3D,
    pub velocity: Velocity3D,
    legs: Vec<Leg>,
    /// 現在の区間インデックス
    leg_index: usize,
    /// 現在の区間での経過時間（秒）
    leg_elapsed: f64,
}

impl GroundTarget {
    pub fn new(id: RgvId, start: Position3D, legs: Vec<Leg>) -> Self {
        let mut target = Self {
            id,
            position: Position3D::new(start.x, start.y, 0.0),
            velocity: Velocity3D::zero(),
            legs,
            leg_index: 0,
            leg_elapsed: 0.0,
        };
        target.skip_empty_legs();
        target
    }

    /// すべての区間を消化して停止しているか
    pub fn is_stationary(&self) -> bool {
        self.leg_index >= self.legs.len()
    }

    fn skip_empty_legs(&mut self) {
        while let Some(leg) = self.legs.get(self.leg_index) {
            if self.leg_elapsed < leg.duration {
                self.velocity = leg.velocity;
                return;
            }
            self.leg_index += 1;
            self.leg_elapsed = 0.0;
        }
        self.velocity = Velocity3D::zero();
    }
}

impl IAgent for GroundTarget {
    /// 区間の境界をまたぐ場合は境界で分割して積分する
    fn tick(&mut self, dt: f64) {
        let mut remaining = dt;
        while remaining > 0.0 {
            let Some(leg) = self.legs.get(self.leg_index).copied() else {
                break;
            };
            let step = remaining.min(leg.duration - self.leg_elapsed);
            self.position = self.position + leg.velocity.displacement(step);
            self.leg_elapsed += step;
            remaining -= step;
            self.skip_empty_legs();
        }
        // 地上を走行する
        self.position.z = 0.0;
    }

    fn get_id(&self) -> String {
        self.id.to_string()
    }

    fn is_active(&self) -> bool {
        !self.is_stationary()
    }
}
