use crate::models::{
    traits::IGroundProjector,
    common::Position3D,
    rgv_track::{RgvId, RgvTracker},
    vehicle_state::VehicleState,
};
use tracing::trace;

/// ビジョン前段が出力するブロブ
///
/// RGVごとの色検出器が同定済みの場合は`rgv`に識別子が入ります。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    /// 重心の画素座標
    pub u: f64,
    pub v: f64,
    /// 面積（画素数）
    pub area: f64,
    /// 上流で同定済みのRGV
    pub rgv: Option<RgvId>,
}

/// 1台のカメラの1フレーム分の検出結果
#[derive(Debug, Clone, PartialEq)]
pub struct VisionFrame {
    pub camera_id: usize,
    /// 撮像時刻（秒）
    pub timestamp: f64,
    pub blobs: Vec<Blob>,
}

/// RGVに関連付けられた地上位置の検出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub rgv: RgvId,
    pub position: Position3D,
    pub timestamp: f64,
    pub area: f64,
}

impl Detection {
    /// 同じRGVの候補同士で、より新しく大きいものを優先
    fn supersedes(&self, other: &Detection) -> bool {
        self.timestamp > other.timestamp
            || (self.timestamp == other.timestamp && self.area > other.area)
    }
}

/// ブロブとRGVの関連付け
///
/// 各ブロブをカメラモデルで地上へ逆投影し、同定済みならそのRGVへ、
/// 未同定なら推定位置が最も近いトラッカー（`gate_radius`以内）へ
/// 割り当てます。まだ一度も検出されていないRGVしか残っていない場合は
/// 番号の小さい方へ割り当てます。
///
/// # 戻り値
///
/// RGVごとの最良の検出（インデックスは`RgvId::index`）
pub fn associate(
    frames: &[VisionFrame],
    uas: &VehicleState,
    cameras: &[Box<dyn IGroundProjector + Send + Sync>],
    trackers: &[RgvTracker; 2],
    gate_radius: f64,
) -> [Option<Detection>; 2] {
    let mut best: [Option<Detection>; 2] = [None, None];

    for frame in frames {
        let Some(camera) = cameras.iter().find(|c| c.camera_id() == frame.camera_id) else {
            trace!(camera_id = frame.camera_id, "未登録カメラのフレームを無視しました");
            continue;
        };

        for blob in &frame.blobs {
            let Some(position) = camera.pixel_to_ground(uas, blob.u, blob.v) else {
                continue;
            };

            let rgv = match blob.rgv {
                Some(id) => Some(id),
                None => nearest_track(&position, trackers, gate_radius),
            };
            let Some(rgv) = rgv else {
                continue;
            };

            let candidate = Detection {
                rgv,
                position,
                timestamp: frame.timestamp,
                area: blob.area,
            };
            let slot = &mut best[rgv.index()];
            if slot.is_none_or(|current| candidate.supersedes(&current)) {
                *slot = Some(candidate);
            }
        }
    }

    best
}

/// 未同定ブロブの割り当て先
fn nearest_track(position: &Position3D, trackers: &[RgvTracker; 2], gate_radius: f64) -> Option<RgvId> {
    let nearest = trackers
        .iter()
        .filter(|t| t.has_been_seen())
        .map(|t| (t.id, t.estimate().position.distance_xy(position)))
        .filter(|(_, d)| *d <= gate_radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id);

    nearest.or_else(|| trackers.iter().find(|t| !t.has_been_seen()).map(|t| t.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::camera::NadirCamera;
    use crate::models::rgv_track::TrackerParams;

    fn trackers() -> [RgvTracker; 2] {
        let params = TrackerParams {
            stop_velocity_thresh: 0.2,
            stop_time_thresh: 2.0,
            coarse_localization_time: 3.0,
            fine_localization_time: 4.0,
            localization_window_radius: 1.0,
            velocity_window: 5,
        };
        [RgvTracker::new(RgvId::One, params), RgvTracker::new(RgvId::Two, params)]
    }

    fn cameras() -> Vec<Box<dyn IGroundProjector + Send + Sync>> {
        vec![Box::new(NadirCamera::new(0, 400.0, 400.0, 640.0, 480.0))]
    }

    fn uas() -> VehicleState {
        VehicleState::at(Position3D::from_altitude(0.0, 0.0, 10.0))
    }

    #[test]
    fn test_tagged_blob_goes_to_its_rgv() {
        let frames = vec![VisionFrame {
            camera_id: 0,
            timestamp: 1.0,
            blobs: vec![Blob { u: 320.0, v: 240.0, area: 50.0, rgv: Some(RgvId::Two) }],
        }];
        let result = associate(&frames, &uas(), &cameras(), &trackers(), 5.0);
        assert!(result[0].is_none());
        let det = result[1].unwrap();
        assert_eq!(det.rgv, RgvId::Two);
        assert!(det.position.distance_xy(&Position3D::new(0.0, 0.0, 0.0)) < 1e-9);
    }

    #[test]
    fn test_untagged_blob_uses_nearest_track() {
        let mut trackers = trackers();
        trackers[0].update_from_detection(Position3D::new(-5.0, 0.0, 0.0), 0.5);
        trackers[1].update_from_detection(Position3D::new(1.0, 0.0, 0.0), 0.5);
        let frames = vec![VisionFrame {
            camera_id: 0,
            timestamp: 1.0,
            blobs: vec![Blob { u: 320.0, v: 240.0, area: 50.0, rgv: None }],
        }];
        let result = associate(&frames, &uas(), &cameras(), &trackers, 3.0);
        assert!(result[0].is_none());
        assert_eq!(result[1].unwrap().rgv, RgvId::Two);
    }

    #[test]
    fn test_untagged_blob_without_tracks_goes_to_first_unseen() {
        let frames = vec![VisionFrame {
            camera_id: 0,
            timestamp: 1.0,
            blobs: vec![Blob { u: 100.0, v: 100.0, area: 10.0, rgv: None }],
        }];
        let result = associate(&frames, &uas(), &cameras(), &trackers(), 3.0);
        assert_eq!(result[0].unwrap().rgv, RgvId::One);
    }

    #[test]
    fn test_larger_blob_wins_and_unknown_camera_is_ignored() {
        let frames = vec![
            VisionFrame {
                camera_id: 0,
                timestamp: 1.0,
                blobs: vec![
                    Blob { u: 300.0, v: 240.0, area: 10.0, rgv: Some(RgvId::One) },
                    Blob { u: 340.0, v: 240.0, area: 80.0, rgv: Some(RgvId::One) },
                ],
            },
            VisionFrame {
                camera_id: 7,
                timestamp: 2.0,
                blobs: vec![Blob { u: 0.0, v: 0.0, area: 500.0, rgv: Some(RgvId::One) }],
            },
        ];
        let result = associate(&frames, &uas(), &cameras(), &trackers(), 3.0);
        let det = result[0].unwrap();
        assert_eq!(det.area, 80.0);
        assert_eq!(det.timestamp, 1.0);
    }
}
