//! # Cache モジュール
//!
//! 非同期に到着する入力（テレメトリ、姿勢、ビジョン）の書き込み側と、
//! スケジューラの周期ティック（読み取り側）との境界です。
//!
//! 書き込みはすべてミューテックスで保護され、境界で検証されます。
//! 非有限値や不正なタイムスタンプはここで拒否し、フェーズ計算へは
//! 伝播させません。読み取り側は`snapshot`で最新値の写しを受け取り、
//! 待機することはありません。

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

use crate::models::{
    association::VisionFrame,
    common::{Position3D, Velocity3D},
    vehicle_state::VehicleState,
};

/// 入力検証エラー
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("非有限値を含む入力です: {0}")]
    NonFinite(&'static str),

    #[error("不正なタイムスタンプです: {0}")]
    InvalidTimestamp(f64),

    #[error("古いタイムスタンプの入力です: {received} <= {latest}")]
    OutOfOrder { latest: f64, received: f64 },
}

/// UASテレメトリ（位置・速度・方位）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: f64,
    pub position: Position3D,
    pub velocity: Velocity3D,
    pub heading: f64,
}

/// UAS姿勢クォータニオン（w, x, y, z）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeSample {
    pub timestamp: f64,
    pub q: [f64; 4],
}

/// ティック開始時点のキャッシュの写し
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    /// 最新のUAS状態（テレメトリ未受信ならNone）
    pub uas: Option<VehicleState>,
    pub telemetry_time: Option<f64>,
    pub attitude_time: Option<f64>,
    /// カメラごとの最新フレーム（カメラID順）
    pub frames: Vec<VisionFrame>,
}

impl InputSnapshot {
    /// テレメトリの経過時間（未受信ならNone）
    pub fn telemetry_age(&self, now: f64) -> Option<f64> {
        self.telemetry_time.map(|t| now - t)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    uas: Option<VehicleState>,
    telemetry_time: Option<f64>,
    attitude: Option<AttitudeSample>,
    frames: BTreeMap<usize, VisionFrame>,
}

/// 入力キャッシュ
#[derive(Debug, Default)]
pub struct InputCache {
    state: Mutex<CacheState>,
}

impl InputCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // 書き込みは検証後の代入のみで、途中状態は残らない
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// テレメトリの書き込み
    pub fn update_telemetry(&self, sample: TelemetrySample) -> Result<(), InputError> {
        validate_timestamp(sample.timestamp)?;
        if !sample.position.is_finite() {
            return Err(InputError::NonFinite("position"));
        }
        if !sample.velocity.is_finite() {
            return Err(InputError::NonFinite("velocity"));
        }
        if !sample.heading.is_finite() {
            return Err(InputError::NonFinite("heading"));
        }

        let mut state = self.lock();
        if let Some(latest) = state.telemetry_time {
            if sample.timestamp <= latest {
                return Err(InputError::OutOfOrder { latest, received: sample.timestamp });
            }
        }

        let uas = state.uas.get_or_insert_with(VehicleState::default);
        uas.update_state(
            sample.position.x,
            sample.position.y,
            sample.position.z,
            sample.heading,
            sample.velocity.x,
            sample.velocity.y,
            sample.velocity.z,
        );
        state.telemetry_time = Some(sample.timestamp);
        Ok(())
    }

    /// 姿勢の書き込み
    ///
    /// クォータニオンは正規化して保持します。
    pub fn update_attitude(&self, sample: AttitudeSample) -> Result<(), InputError> {
        validate_timestamp(sample.timestamp)?;
        if sample.q.iter().any(|c| !c.is_finite()) {
            return Err(InputError::NonFinite("attitude"));
        }
        let norm = sample.q.iter().map(|c| c * c).sum::<f64>().sqrt();
        if norm < 1e-9 {
            return Err(InputError::NonFinite("attitude"));
        }

        let mut state = self.lock();
        if let Some(latest) = state.attitude.map(|a| a.timestamp) {
            if sample.timestamp <= latest {
                return Err(InputError::OutOfOrder { latest, received: sample.timestamp });
            }
        }
        let q = sample.q.map(|c| c / norm);
        state.attitude = Some(AttitudeSample { timestamp: sample.timestamp, q });
        if let Some(uas) = state.uas.as_mut() {
            uas.update_attitude(q[0], q[1], q[2], q[3]);
        }
        Ok(())
    }

    /// ビジョンフレームの書き込み（カメラごとに最新の1フレームを保持）
    pub fn update_vision(&self, frame: VisionFrame) -> Result<(), InputError> {
        validate_timestamp(frame.timestamp)?;
        if frame
            .blobs
            .iter()
            .any(|b| !(b.u.is_finite() && b.v.is_finite() && b.area.is_finite()))
        {
            return Err(InputError::NonFinite("blob"));
        }

        let mut state = self.lock();
        if let Some(latest) = state.frames.get(&frame.camera_id).map(|f| f.timestamp) {
            if frame.timestamp < latest {
                warn!(camera_id = frame.camera_id, latest, received = frame.timestamp, "古いビジョンフレームを破棄しました");
                return Err(InputError::OutOfOrder { latest, received: frame.timestamp });
            }
        }
        state.frames.insert(frame.camera_id, frame);
        Ok(())
    }

    /// 最新値の写し
    pub fn snapshot(&self) -> InputSnapshot {
        let state = self.lock();
        let mut uas = state.uas;
        // 姿勢がテレメトリより先に届いた場合もここで反映する
        if let (Some(uas), Some(att)) = (uas.as_mut(), state.attitude) {
            uas.attitude = att.q;
        }
        InputSnapshot {
            uas,
            telemetry_time: state.telemetry_time,
            attitude_time: state.attitude.map(|a| a.timestamp),
            frames: state.frames.values().cloned().collect(),
        }
    }
}

fn validate_timestamp(timestamp: f64) -> Result<(), InputError> {
    if timestamp.is_finite() && timestamp >= 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidTimestamp(timestamp))
    }
}
