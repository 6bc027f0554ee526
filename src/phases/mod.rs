//! # Phases モジュール
//!
//! ミッションの各フェーズにおける制御意図（セットポイント）の計算を提供します。
//!
//! フェーズは閉じた集合`MissionPhase`として表し、スケジューラは
//! タグで`compute_setpoint`をディスパッチします。各フェーズの計算は
//! `PhaseContext`を借用するだけの純粋関数で、ティック間の状態を保持しません。
//! 粗位置特定の開始時刻のような記憶は`RgvTracker`側にあります。
//!
//! | フェーズ | 制御モード | 目標 |
//! |---|---|---|
//! | Exploration | 位置 | 現在のウェイポイント |
//! | CoarseLocalization | 速度 | 主対象RGVの推定位置上空へ一定速度で接近・降下 |
//! | Trailing | 姿勢＋推力 | 主対象RGVを追尾 |
//! | JointExploration | 姿勢＋推力 | 2台の中点を追尾 |
//! | JointTrailing | 姿勢＋推力 | 信頼度の低い方（同値なら近い方）を追尾 |

pub mod exploration;
pub mod coarse_localization;
pub mod trailing;
pub mod joint_exploration;
pub mod joint_trailing;

use std::fmt;
use crate::models::{
    common::{Position3D, bearing_xy, quaternion_to_thrust_attitude},
    rgv_track::{RgvId, RgvTracker},
    vehicle_state::{VehicleState, Waypoint},
};
use crate::output::{ControlIntent, Setpoint};

/// ミッションフェーズ
///
/// 順序は遷移の優先順位と一致し、遷移は原則として前方向のみです。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MissionPhase {
    Exploration,
    CoarseLocalization,
    Trailing,
    JointExploration,
    JointTrailing,
}

impl MissionPhase {
    /// アクティブなフェーズのセットポイント計算
    pub fn compute_setpoint(self, ctx: &PhaseContext) -> ControlIntent {
        match self {
            MissionPhase::Exploration => exploration::compute_setpoint(ctx),
            MissionPhase::CoarseLocalization => coarse_localization::compute_setpoint(ctx),
            MissionPhase::Trailing => trailing::compute_setpoint(ctx),
            MissionPhase::JointExploration => joint_exploration::compute_setpoint(ctx),
            MissionPhase::JointTrailing => joint_trailing::compute_setpoint(ctx),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MissionPhase::Exploration => "exploration",
            MissionPhase::CoarseLocalization => "coarse",
            MissionPhase::Trailing => "trailing",
            MissionPhase::JointExploration => "jointExploration",
            MissionPhase::JointTrailing => "jointTrailing",
        }
    }
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 誘導パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceParams {
    /// 粗位置特定時の水平接近速度（m/s）
    pub coarse_speed: f64,
    /// 粗位置特定時の降下速度（m/s）
    pub coarse_descent_speed: f64,
    /// 粗位置特定時の目標高度（m）
    pub coarse_altitude: f64,
    /// この水平距離以内ではホバリング（m）
    pub hover_radius: f64,
    /// 追尾時の保持高度（m）
    pub trailing_altitude: f64,
    /// 2台同時探索・追尾時の保持高度（m）
    pub joint_altitude: f64,
    /// ホバリング推力（正規化）
    pub hover_thrust: f64,
    /// 最大傾斜角（rad）
    pub max_tilt: f64,
    /// 水平距離あたりの傾斜角ゲイン（rad/m）
    pub tilt_gain: f64,
    /// 接近速度による傾斜角の減衰ゲイン（rad/(m/s)）
    pub tilt_damping: f64,
    /// 高度誤差あたりの推力ゲイン（1/m）
    pub altitude_gain: f64,
    /// 高度保持の許容誤差（m）
    pub altitude_tolerance: f64,
}

/// フェーズ計算への入力（ティックごとに借用）
#[derive(Debug, Clone, Copy)]
pub struct PhaseContext<'a> {
    pub now: f64,
    pub uas: &'a VehicleState,
    pub trackers: &'a [RgvTracker; 2],
    /// 探索中または追尾中の主対象
    pub primary: RgvId,
    /// 探索ウェイポイント（カーソル位置）
    pub waypoint: &'a Waypoint,
    pub guidance: &'a GuidanceParams,
}

impl PhaseContext<'_> {
    pub fn tracker(&self, id: RgvId) -> &RgvTracker {
        &self.trackers[id.index()]
    }
}

/// 地上の点を姿勢＋推力で追尾するセットポイント
///
/// ヨーは目標方位、ピッチは水平距離に比例した前傾（接近速度で減衰、
/// `max_tilt`でクランプ）、推力は`hold_altitude`を保つように補正します。
/// 推力の正規化範囲0〜1への制限は`quaternion_to_thrust_attitude`が行います。
pub(crate) fn track_point(
    uas: &VehicleState,
    target: &VehicleState,
    hold_altitude: f64,
    guidance: &GuidanceParams,
) -> ControlIntent {
    let range = uas.position.distance_xy(&target.position);
    let yaw = if range > 1e-6 {
        bearing_xy(&uas.position, &target.position)
    } else {
        uas.heading
    };

    let closing_speed = if range > 1e-6 {
        let (dir_x, dir_y) = ((target.position.x - uas.position.x) / range, (target.position.y - uas.position.y) / range);
        let relative = uas.velocity - target.velocity;
        relative.x * dir_x + relative.y * dir_y
    } else {
        0.0
    };

    let tilt = (guidance.tilt_gain * range - guidance.tilt_damping * closing_speed)
        .clamp(-guidance.max_tilt, guidance.max_tilt);
    let pitch = -tilt;

    let altitude_error = hold_altitude - uas.altitude();
    let thrust = (guidance.hover_thrust + guidance.altitude_gain * altitude_error) / pitch.cos().max(0.1);

    ControlIntent::new(Setpoint::AttitudeThrust(quaternion_to_thrust_attitude(yaw, pitch, thrust)))
}

/// 水平位置だけを残した地上の点
pub(crate) fn ground_point(position: &Position3D) -> VehicleState {
    VehicleState::at(Position3D::new(position.x, position.y, 0.0))
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::*;
    use crate::models::common::euler_from_quaternion;
    use crate::output::ControlMode;

    #[test]
    fn test_phase_order_matches_transition_priority() {
        assert!(MissionPhase::Exploration < MissionPhase::CoarseLocalization);
        assert!(MissionPhase::CoarseLocalization < MissionPhase::Trailing);
        assert!(MissionPhase::Trailing < MissionPhase::JointExploration);
        assert!(MissionPhase::JointExploration < MissionPhase::JointTrailing);
        assert_eq!(MissionPhase::CoarseLocalization.to_string(), "coarse");
    }

    #[test]
    fn test_track_point_pitches_forward_toward_target() {
        let uas = uas_at(0.0, 0.0, 8.0);
        let target = ground_point(&Position3D::new(0.0, 20.0, 0.0));
        let intent = track_point(&uas, &target, 8.0, &guidance());
        assert_eq!(intent.mode(), ControlMode::AttitudeThrust);
        let Setpoint::AttitudeThrust(cmd) = intent.setpoint else {
            panic!("attitude setpoint expected");
        };
        let (_, pitch, yaw) = euler_from_quaternion(cmd.q);
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        // 20m * 0.05 = 1.0 rad は最大傾斜でクランプされる
        assert!((pitch + 0.35).abs() < 1e-9);
        assert!(cmd.thrust_body[2] < -0.5);
    }

    #[test]
    fn test_track_point_adds_thrust_when_low() {
        let target = ground_point(&Position3D::new(0.0, 0.0, 0.0));
        let low = track_point(&uas_at(0.0, 0.0, 4.0), &target, 8.0, &guidance());
        let high = track_point(&uas_at(0.0, 0.0, 12.0), &target, 8.0, &guidance());
        let thrust = |intent: ControlIntent| match intent.setpoint {
            Setpoint::AttitudeThrust(cmd) => -cmd.thrust_body[2],
            _ => panic!("attitude setpoint expected"),
        };
        assert!(thrust(low) > 0.5);
        assert!(thrust(high) < 0.5);
    }

    #[test]
    fn test_track_point_thrust_stays_normalized() {
        let target = ground_point(&Position3D::new(0.0, 0.0, 0.0));
        let thrust = |altitude: f64| match track_point(&uas_at(0.0, 0.0, altitude), &target, 8.0, &guidance()).setpoint {
            Setpoint::AttitudeThrust(cmd) => -cmd.thrust_body[2],
            _ => panic!("attitude setpoint expected"),
        };
        // 0.5 + 0.05 * (8 - 40) < 0
        assert_eq!(thrust(40.0), 0.0);
        // 0.5 + 0.05 * (8 - (-20)) > 1
        assert_eq!(thrust(-20.0), 1.0);
        assert!((thrust(8.0) - 0.5).abs() < 1e-12);
    }
}
