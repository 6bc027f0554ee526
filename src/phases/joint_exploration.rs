//! 2台同時探索フェーズ: 両RGVの推定位置の中点（片方しか捕捉していない
//! 場合はその推定位置）を、両方が撮像範囲に入りやすい高度で追います。

use super::{PhaseContext, ground_point, track_point};
use crate::output::ControlIntent;

pub fn compute_setpoint(ctx: &PhaseContext) -> ControlIntent {
    let primary = ctx.tracker(ctx.primary);
    let secondary = ctx.tracker(ctx.primary.other());

    let aim = match (primary.has_been_seen(), secondary.has_been_seen()) {
        (true, true) => ground_point(&primary.estimate().position.midpoint(&secondary.estimate().position)),
        (false, true) => *secondary.estimate(),
        _ => *primary.estimate(),
    };

    track_point(ctx.uas, &aim, ctx.guidance.joint_altitude, ctx.guidance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        common::{Position3D, euler_from_quaternion},
        rgv_track::RgvId,
        vehicle_state::Waypoint,
    };
    use crate::output::Setpoint;
    use crate::phases::test_support::*;

    #[test]
    fn test_aims_at_midpoint_of_both_targets() {
        let mut trackers = trackers();
        trackers[0].update_from_detection(Position3D::new(10.0, 10.0, 0.0), 1.0);
        trackers[1].update_from_detection(Position3D::new(10.0, -10.0, 0.0), 1.0);
        let guidance = guidance();
        let uas = uas_at(0.0, 0.0, 15.0);
        let waypoint = Waypoint::new(0, Position3D::from_altitude(0.0, 0.0, 20.0));
        let ctx = PhaseContext {
            now: 1.0,
            uas: &uas,
            trackers: &trackers,
            primary: RgvId::One,
            waypoint: &waypoint,
            guidance: &guidance,
        };
        let Setpoint::AttitudeThrust(cmd) = compute_setpoint(&ctx).setpoint else {
            panic!("attitude setpoint expected");
        };
        let (_, _, yaw) = euler_from_quaternion(cmd.q);
        // 中点(10, 0)は真北
        assert!(yaw.abs() < 1e-9);
        // 保持高度にいるのでホバリング推力を傾斜分だけ補正
        let expected = 0.5 / 0.35f64.cos();
        assert!((-cmd.thrust_body[2] - expected).abs() < 1e-9);
    }
}
