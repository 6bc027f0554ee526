use std::ops::{Add, Sub, Mul};
use nalgebra::UnitQuaternion;
use crate::models::vehicle_state::VehicleState;

/// 3次元位置を表す構造体（ローカルNED座標系）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position3D {
    pub x: f64, // m (北)
    pub y: f64, // m (東)
    pub z: f64, // m (下向き正)
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 高度（NEDのzを反転した値）を指定して作成
    pub fn from_altitude(x: f64, y: f64, altitude: f64) -> Self {
        Self::new(x, y, -altitude)
    }

    /// XY平面での2次元距離を計算
    pub fn distance_xy(&self, other: &Position3D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 3次元距離を計算
    pub fn distance_3d(&self, other: &Position3D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)).sqrt()
    }

    /// ベクトルの長さ（原点からの距離）
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 高度（m、上向き正）
    pub fn altitude(&self) -> f64 {
        -self.z
    }

    /// 2点の中点
    pub fn midpoint(&self, other: &Position3D) -> Self {
        Self::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }

    /// 全成分が有限値かどうか
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Position3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Position3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// 3次元速度を表す構造体
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity3D {
    pub x: f64, // m/s
    pub y: f64, // m/s
    pub z: f64, // m/s
}

impl Velocity3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// 速度ベクトルの大きさ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// XY平面での速度の大きさ
    pub fn magnitude_xy(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    /// 速度制限（最大速度でクリップ）
    pub fn clamp_magnitude(&self, max_speed: f64) -> Self {
        let mag = self.magnitude();
        if mag > max_speed && mag > 0.0 {
            let factor = max_speed / mag;
            Self::new(self.x * factor, self.y * factor, self.z * factor)
        } else {
            *self
        }
    }

    /// 時間dtでの変位
    pub fn displacement(&self, dt: f64) -> Position3D {
        Position3D::new(self.x * dt, self.y * dt, self.z * dt)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Velocity3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Velocity3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Velocity3D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// 姿勢＋推力の指令値
///
/// 姿勢はクォータニオン（w, x, y, z）、推力は機体座標系（FRD）で表します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeThrust {
    pub q: [f64; 4],
    pub thrust_body: [f64; 3],
}

/// 2つのVehicleState間の3次元ユークリッド距離
///
/// ウェイポイント到達判定と機体間の近接判定に使用します。
pub fn distance(a: &VehicleState, b: &VehicleState) -> f64 {
    a.position.distance_3d(&b.position)
}

/// ヨー・ピッチ指令を姿勢クォータニオンと機体推力に変換
///
/// ロールは0固定、ZYXオイラー角として解釈します。推力は機体z軸の負方向
/// （上向き）に与えます。
///
/// # 引数
///
/// * `yaw` - ヨー角（rad、北から東回り）
/// * `pitch` - ピッチ角（rad、機首上げ正）
/// * `thrust` - 正規化推力（0〜1）
pub fn quaternion_to_thrust_attitude(yaw: f64, pitch: f64, thrust: f64) -> AttitudeThrust {
    let uq = UnitQuaternion::from_euler_angles(0.0, pitch, yaw);
    let q = uq.quaternion();
    AttitudeThrust {
        q: [q.w, q.i, q.j, q.k],
        thrust_body: [0.0, 0.0, -thrust.clamp(0.0, 1.0)],
    }
}

/// クォータニオン（w, x, y, z）からオイラー角（roll, pitch, yaw）を取得
pub fn euler_from_quaternion(q: [f64; 4]) -> (f64, f64, f64) {
    let uq = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q[0], q[1], q[2], q[3]));
    uq.euler_angles()
}

/// fromからtoへのXY平面上の方位角（rad、北から東回り）
pub fn bearing_xy(from: &Position3D, to: &Position3D) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * std::f64::consts::PI / 180.0
    }

    /// 角度を-π〜πの範囲に正規化
    pub fn normalize_angle(angle_rad: f64) -> f64 {
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut normalized = angle_rad % two_pi;
        if normalized > std::f64::consts::PI {
            normalized -= two_pi;
        } else if normalized <= -std::f64::consts::PI {
            normalized += two_pi;
        }
        normalized
    }
}
