use crate::models::{
    traits::IGroundProjector,
    common::Position3D,
    vehicle_state::VehicleState,
};

/// 直下視ピンホールカメラ
///
/// 機体直下を向いたカメラで、画像のu軸が機体右方向、v軸が機体後方に
/// 対応します。地面はz = 0の平面として扱います。
#[derive(Debug, Clone, PartialEq)]
pub struct NadirCamera {
    /// カメラの一意識別子
    pub id: usize,
    /// 焦点距離（画素）
    pub fx: f64,
    pub fy: f64,
    /// 画像中心（画素）
    pub cx: f64,
    pub cy: f64,
    /// 画像サイズ（画素）
    pub width: f64,
    pub height: f64,
}

impl NadirCamera {
    pub fn new(id: usize, fx: f64, fy: f64, width: f64, height: f64) -> Self {
        Self {
            id,
            fx,
            fy,
            cx: width / 2.0,
            cy: height / 2.0,
            width,
            height,
        }
    }

    /// 画素が画像内かどうか
    pub fn contains_pixel(&self, u: f64, v: f64) -> bool {
        u >= 0.0 && u < self.width && v >= 0.0 && v < self.height
    }

    /// 指定高度での地上の撮像範囲（前後, 左右）の半幅（m）
    pub fn footprint_half_extent(&self, altitude: f64) -> (f64, f64) {
        (self.cy / self.fy * altitude, self.cx / self.fx * altitude)
    }
}

impl IGroundProjector for NadirCamera {
    fn camera_id(&self) -> usize {
        self.id
    }

    fn pixel_to_ground(&self, uas: &VehicleState, u: f64, v: f64) -> Option<Position3D> {
        let h = uas.altitude();
        if h <= 0.0 {
            return None;
        }

        // 機体座標系での地上オフセット
        let forward = -(v - self.cy) / self.fy * h;
        let right = (u - self.cx) / self.fx * h;

        let (sin_psi, cos_psi) = uas.heading.sin_cos();
        Some(Position3D::new(
            uas.position.x + forward * cos_psi - right * sin_psi,
            uas.position.y + forward * sin_psi + right * cos_psi,
            0.0,
        ))
    }

    fn ground_to_pixel(&self, uas: &VehicleState, point: &Position3D) -> Option<(f64, f64)> {
        let h = uas.altitude() - point.altitude();
        if h <= 0.0 {
            return None;
        }

        let dx = point.x - uas.position.x;
        let dy = point.y - uas.position.y;
        let (sin_psi, cos_psi) = uas.heading.sin_cos();
        let forward = dx * cos_psi + dy * sin_psi;
        let right = -dx * sin_psi + dy * cos_psi;

        let u = self.cx + right * self.fx / h;
        let v = self.cy - forward * self.fy / h;
        self.contains_pixel(u, v).then_some((u, v))
    }
}
