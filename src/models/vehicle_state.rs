use crate::models::common::{Position3D, Velocity3D, euler_from_quaternion};

/// 追跡対象（UASまたはRGV）の状態スナップショット
///
/// 位置・速度はウェイポイントと同じローカルNED座標系で表します。
/// 書き込みは所有者（UASはキャッシュ、RGVは各トラッカー）のみが行い、
/// それ以外は読み取り専用で共有されます。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    /// 位置（m）
    pub position: Position3D,
    /// 速度（m/s）
    pub velocity: Velocity3D,
    /// 方位（rad、北から東回り）
    pub heading: f64,
    /// 姿勢クォータニオン（q0..q3 = w, x, y, z）
    pub attitude: [f64; 4],
    /// 機体推力（FRD、推力指令がある場合のみ）
    pub thrust: Option<[f64; 3]>,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            position: Position3D::default(),
            velocity: Velocity3D::zero(),
            heading: 0.0,
            attitude: [1.0, 0.0, 0.0, 0.0],
            thrust: None,
        }
    }
}

impl VehicleState {
    /// 指定位置で静止している状態
    pub fn at(position: Position3D) -> Self {
        Self { position, ..Self::default() }
    }

    /// 位置・方位・速度の更新（テレメトリ受信時）
    pub fn update_state(&mut self, x: f64, y: f64, z: f64, heading: f64, vx: f64, vy: f64, vz: f64) {
        self.position = Position3D::new(x, y, z);
        self.heading = heading;
        self.velocity = Velocity3D::new(vx, vy, vz);
    }

    /// 姿勢クォータニオンの更新
    pub fn update_attitude(&mut self, q0: f64, q1: f64, q2: f64, q3: f64) {
        self.attitude = [q0, q1, q2, q3];
    }

    /// 高度（m、上向き正）
    pub fn altitude(&self) -> f64 {
        self.position.altitude()
    }

    /// 速さ（m/s）
    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }

    /// 姿勢クォータニオンから求めたヨー角
    pub fn attitude_yaw(&self) -> f64 {
        euler_from_quaternion(self.attitude).2
    }

    /// 全フィールドが有限値かどうか
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.heading.is_finite()
            && self.attitude.iter().all(|v| v.is_finite())
            && self.thrust.is_none_or(|t| t.iter().all(|v| v.is_finite()))
    }
}

/// 探索ウェイポイント
///
/// 読み込み後は不変で、探索順序はミッション中固定です。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub index: usize,
    pub state: VehicleState,
}

impl Waypoint {
    pub fn new(index: usize, position: Position3D) -> Self {
        Self { index, state: VehicleState::at(position) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_state_and_altitude() {
        let mut state = VehicleState::default();
        state.update_state(1.0, 2.0, -15.0, 0.5, 0.1, 0.2, -0.3);
        assert_eq!(state.altitude(), 15.0);
        assert_eq!(state.heading, 0.5);
        assert!((state.speed() - (0.14f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_state_is_detected() {
        let mut state = VehicleState::default();
        assert!(state.is_finite());
        state.update_state(f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert!(!state.is_finite());

        let mut state = VehicleState::default();
        state.thrust = Some([0.0, 0.0, f64::INFINITY]);
        assert!(!state.is_finite());
    }

    #[test]
    fn test_attitude_yaw() {
        let mut state = VehicleState::default();
        let half = std::f64::consts::FRAC_PI_4;
        // z軸回りに90度
        state.update_attitude(half.cos(), 0.0, 0.0, half.sin());
        assert!((state.attitude_yaw() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }
}
