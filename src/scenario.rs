use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use thiserror::Error;

use crate::models::{
    camera::NadirCamera,
    common::{math_utils, Position3D},
    rgv_track::{RgvId, TrackerParams},
    traits::IGroundProjector,
    vehicle_state::Waypoint,
};
use crate::phases::GuidanceParams;
use crate::scheduler::SchedulerParams;

/// ミッションメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissionMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// スケジューラのティック周期（秒）
    pub tick_period_s: f64,
    /// ミッション時間（秒）
    pub duration_s: f64,
}

/// 判定しきい値
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdConfig {
    pub stop_velocity_mps: f64,
    pub stop_time_s: f64,
    pub coarse_localization_time_s: f64,
    pub fine_localization_time_s: f64,
    pub localization_window_radius_m: f64,
    #[serde(default = "default_velocity_window")]
    pub velocity_window: usize,
    pub arrival_radius_m: f64,
    pub min_height_m: f64,
    pub max_height_m: f64,
    #[serde(default = "default_gate_radius")]
    pub association_gate_radius_m: f64,
}

fn default_velocity_window() -> usize {
    5
}

fn default_gate_radius() -> f64 {
    3.0
}

/// 入力の許容経過時間
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StalenessConfig {
    pub telemetry_max_age_s: f64,
    pub vision_max_age_s: f64,
}

impl Default for StalenessConfig {
    fn default() -> Self {
        Self {
            telemetry_max_age_s: 0.5,
            vision_max_age_s: 0.2,
        }
    }
}

/// 位置特定できない場合の復帰設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// 粗位置特定フェーズの最大滞在時間
    pub coarse_dwell_timeout_s: f64,
    /// 探索へ戻った後、同じRGVを再捕捉しない時間
    pub reacquire_cooldown_s: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            coarse_dwell_timeout_s: 30.0,
            reacquire_cooldown_s: 10.0,
        }
    }
}

/// 誘導設定
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub coarse_speed_mps: f64,
    pub coarse_descent_mps: f64,
    pub coarse_altitude_m: f64,
    pub hover_radius_m: f64,
    pub trailing_altitude_m: f64,
    pub joint_altitude_m: f64,
    pub hover_thrust: f64,
    pub max_tilt_deg: f64,
    pub tilt_gain_rad_per_m: f64,
    pub tilt_damping_rad_per_mps: f64,
    pub altitude_gain_per_m: f64,
    pub altitude_tolerance_m: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            coarse_speed_mps: 2.0,
            coarse_descent_mps: 1.0,
            coarse_altitude_m: 10.0,
            hover_radius_m: 1.0,
            trailing_altitude_m: 8.0,
            joint_altitude_m: 15.0,
            hover_thrust: 0.5,
            max_tilt_deg: 20.0,
            tilt_gain_rad_per_m: 0.05,
            tilt_damping_rad_per_mps: 0.1,
            altitude_gain_per_m: 0.05,
            altitude_tolerance_m: 0.25,
        }
    }
}

/// オフボード制御設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OffboardConfig {
    /// モード切替とアームの前に送出するセットポイント数
    pub warmup_ticks: u32,
}

impl Default for OffboardConfig {
    fn default() -> Self {
        Self { warmup_ticks: 10 }
    }
}

/// 位置（ローカルNED、m）
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct PositionConfig {
    pub x_m: f64,
    pub y_m: f64,
    #[serde(default)]
    pub z_m: f64,
}

impl PositionConfig {
    pub fn to_position(self) -> Position3D {
        Position3D::new(self.x_m, self.y_m, self.z_m)
    }
}

/// 直下視カメラ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    pub id: usize,
    pub fx_px: f64,
    pub fy_px: f64,
    pub width_px: f64,
    pub height_px: f64,
}

/// UAS機体モデル設定（シミュレーション用）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UasConfig {
    pub start: PositionConfig,
    #[serde(default)]
    pub heading_deg: f64,
    pub max_speed_mps: f64,
    pub max_vertical_speed_mps: f64,
    /// 速度応答の時定数（秒）
    pub response_time_s: f64,
}

/// RGVの移動区間
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LegConfig {
    pub vx_mps: f64,
    pub vy_mps: f64,
    pub duration_s: f64,
}

/// RGV真値モデル設定（シミュレーション用）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RgvConfig {
    /// 1または2
    pub id: u32,
    pub start: PositionConfig,
    #[serde(default)]
    pub legs: Vec<LegConfig>,
}

/// 完全なミッション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MissionConfig {
    pub meta: MissionMeta,
    pub sim: SimulationConfig,
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub staleness: StalenessConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub guidance: GuidanceConfig,
    #[serde(default)]
    pub offboard: OffboardConfig,
    #[serde(default)]
    pub waypoints: Vec<PositionConfig>,
    /// ミッションファイルからの相対パス（列: x_m,y_m,z_m）
    #[serde(default)]
    pub waypoints_csv: Option<PathBuf>,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    pub uas: UasConfig,
    #[serde(default)]
    pub rgvs: Vec<RgvConfig>,
}

impl MissionConfig {
    /// YAMLファイルからミッション設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml_str(&contents, base_dir)
            .map_err(|e| match e {
                ConfigError::Yaml(_, err) => ConfigError::Yaml(path.to_path_buf(), err),
                other => other,
            })
    }

    /// YAML文字列からミッション設定を読み込み
    ///
    /// `waypoints_csv`は`base_dir`からの相対パスとして解決します。
    pub fn from_yaml_str(contents: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: MissionConfig = serde_yaml::from_str(contents)
            .map_err(|e| ConfigError::Yaml(PathBuf::from("<inline>"), e))?;

        if let Some(csv_path) = &config.waypoints_csv {
            if !config.waypoints.is_empty() {
                return Err(ConfigError::Validation(
                    "waypoints と waypoints_csv は同時に指定できません".to_string(),
                ));
            }
            let resolved = base_dir.join(csv_path);
            config.waypoints = load_waypoints_csv(&resolved)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));

        let positive = [
            ("tick_period_s", self.sim.tick_period_s),
            ("duration_s", self.sim.duration_s),
            ("arrival_radius_m", self.thresholds.arrival_radius_m),
            ("coarse_dwell_timeout_s", self.fallback.coarse_dwell_timeout_s),
            ("uas.max_speed_mps", self.uas.max_speed_mps),
            ("uas.max_vertical_speed_mps", self.uas.max_vertical_speed_mps),
            ("uas.response_time_s", self.uas.response_time_s),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{} は正の値でなければなりません (指定値 {})", name, value));
            }
        }

        let th = &self.thresholds;
        let non_negative = [
            ("stop_velocity_mps", th.stop_velocity_mps),
            ("stop_time_s", th.stop_time_s),
            ("coarse_localization_time_s", th.coarse_localization_time_s),
            ("fine_localization_time_s", th.fine_localization_time_s),
            ("localization_window_radius_m", th.localization_window_radius_m),
            ("association_gate_radius_m", th.association_gate_radius_m),
            ("telemetry_max_age_s", self.staleness.telemetry_max_age_s),
            ("vision_max_age_s", self.staleness.vision_max_age_s),
            ("reacquire_cooldown_s", self.fallback.reacquire_cooldown_s),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} は0以上の数値でなければなりません (指定値 {})", name, value));
            }
        }
        if th.velocity_window < 2 {
            return invalid("velocity_window は2以上でなければなりません".to_string());
        }
        if !(th.min_height_m.is_finite() && th.max_height_m.is_finite()) || th.min_height_m >= th.max_height_m {
            return invalid(format!(
                "min_height_m ({}) は max_height_m ({}) より小さくなければなりません",
                th.min_height_m, th.max_height_m
            ));
        }

        let g = &self.guidance;
        if !(g.max_tilt_deg > 0.0 && g.max_tilt_deg < 90.0) {
            return invalid("max_tilt_deg は0〜90度の範囲（両端を除く）でなければなりません".to_string());
        }
        if !(0.0..=1.0).contains(&g.hover_thrust) {
            return invalid("hover_thrust は0〜1の範囲でなければなりません".to_string());
        }

        if self.waypoints.is_empty() {
            return invalid("ウェイポイントが1つもありません".to_string());
        }
        for (i, wp) in self.waypoints.iter().enumerate() {
            if !wp.to_position().is_finite() {
                return invalid(format!("ウェイポイント {} に有限でない値があります", i));
            }
        }

        for camera in &self.cameras {
            let intrinsics = [camera.fx_px, camera.fy_px, camera.width_px, camera.height_px];
            if !intrinsics.iter().all(|v| v.is_finite() && *v > 0.0) {
                return invalid(format!("カメラ {} の内部パラメータは正の値でなければなりません", camera.id));
            }
        }
        for (i, a) in self.cameras.iter().enumerate() {
            if self.cameras[..i].iter().any(|b| b.id == a.id) {
                return invalid(format!("カメラID {} が重複しています", a.id));
            }
        }

        if self.rgvs.len() > 2 {
            return invalid(format!("RGVは最大2台までです (指定 {}台)", self.rgvs.len()));
        }
        for rgv in &self.rgvs {
            if RgvId::from_number(rgv.id).is_none() {
                return invalid(format!("RGVのIDは1または2でなければなりません (指定値 {})", rgv.id));
            }
            if rgv.legs.iter().any(|leg| !(leg.duration_s.is_finite() && leg.duration_s >= 0.0)) {
                return invalid(format!("RGV {} の移動区間に負の継続時間があります", rgv.id));
            }
        }
        if self.rgvs.len() == 2 && self.rgvs[0].id == self.rgvs[1].id {
            return invalid(format!("RGV ID {} が重複しています", self.rgvs[0].id));
        }

        Ok(())
    }

    pub fn tracker_params(&self) -> TrackerParams {
        let th = &self.thresholds;
        TrackerParams {
            stop_velocity_thresh: th.stop_velocity_mps,
            stop_time_thresh: th.stop_time_s,
            coarse_localization_time: th.coarse_localization_time_s,
            fine_localization_time: th.fine_localization_time_s,
            localization_window_radius: th.localization_window_radius_m,
            velocity_window: th.velocity_window,
        }
    }

    pub fn guidance_params(&self) -> GuidanceParams {
        let g = &self.guidance;
        GuidanceParams {
            coarse_speed: g.coarse_speed_mps,
            coarse_descent_speed: g.coarse_descent_mps,
            coarse_altitude: g.coarse_altitude_m,
            hover_radius: g.hover_radius_m,
            trailing_altitude: g.trailing_altitude_m,
            joint_altitude: g.joint_altitude_m,
            hover_thrust: g.hover_thrust,
            max_tilt: math_utils::deg_to_rad(g.max_tilt_deg),
            tilt_gain: g.tilt_gain_rad_per_m,
            tilt_damping: g.tilt_damping_rad_per_mps,
            altitude_gain: g.altitude_gain_per_m,
            altitude_tolerance: g.altitude_tolerance_m,
        }
    }

    pub fn scheduler_params(&self) -> SchedulerParams {
        let th = &self.thresholds;
        SchedulerParams {
            arrival_radius: th.arrival_radius_m,
            min_height: th.min_height_m,
            max_height: th.max_height_m,
            telemetry_max_age: self.staleness.telemetry_max_age_s,
            vision_max_age: self.staleness.vision_max_age_s,
            association_gate_radius: th.association_gate_radius_m,
            coarse_dwell_timeout: self.fallback.coarse_dwell_timeout_s,
            reacquire_cooldown: self.fallback.reacquire_cooldown_s,
            offboard_warmup_ticks: self.offboard.warmup_ticks,
            tracker: self.tracker_params(),
            guidance: self.guidance_params(),
        }
    }

    pub fn mission_waypoints(&self) -> Vec<Waypoint> {
        self.waypoints
            .iter()
            .enumerate()
            .map(|(i, wp)| Waypoint::new(i, wp.to_position()))
            .collect()
    }

    pub fn nadir_cameras(&self) -> Vec<NadirCamera> {
        self.cameras
            .iter()
            .map(|c| NadirCamera::new(c.id, c.fx_px, c.fy_px, c.width_px, c.height_px))
            .collect()
    }

    /// スケジューラへ渡すカメラモデル
    pub fn ground_projectors(&self) -> Vec<Box<dyn IGroundProjector + Send + Sync>> {
        self.nadir_cameras()
            .into_iter()
            .map(|c| Box::new(c) as Box<dyn IGroundProjector + Send + Sync>)
            .collect()
    }

    /// ミッションの概要を表示
    pub fn print_summary(&self) {
        println!("=== ミッション情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("ティック周期: {:.3}秒", self.sim.tick_period_s);
        println!("ミッション時間: {:.1}秒 ({:.1}分)", self.sim.duration_s, self.sim.duration_s / 60.0);
        println!();

        let th = &self.thresholds;
        println!("=== 判定しきい値 ===");
        println!("停止判定: {:.2}m/s 未満が {:.1}秒継続", th.stop_velocity_mps, th.stop_time_s);
        println!("粗位置特定: {:.1}秒 / 同時位置特定: {:.1}秒", th.coarse_localization_time_s, th.fine_localization_time_s);
        println!("到達半径: {:.1}m", th.arrival_radius_m);
        println!("高度範囲: {:.1}〜{:.1}m", th.min_height_m, th.max_height_m);
        println!(
            "粗位置特定の最大滞在: {:.1}秒 (再捕捉待ち {:.1}秒)",
            self.fallback.coarse_dwell_timeout_s, self.fallback.reacquire_cooldown_s
        );
        println!();

        println!("=== ウェイポイント ===");
        for (i, wp) in self.waypoints.iter().enumerate() {
            println!("  {}: ({:.1}, {:.1}, {:.1})", i, wp.x_m, wp.y_m, wp.z_m);
        }
        println!();

        println!("=== 機体・目標 ===");
        println!("カメラ: {}台", self.cameras.len());
        println!("RGV: {}台", self.rgvs.len());
        for rgv in &self.rgvs {
            let moving: f64 = rgv.legs.iter().map(|l| l.duration_s).sum();
            println!(
                "  rgv{}: 開始 ({:.1}, {:.1}) / 移動区間 {}個 ({:.1}秒)",
                rgv.id, rgv.start.x_m, rgv.start.y_m, rgv.legs.len(), moving
            );
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaypointRow {
    x_m: f64,
    y_m: f64,
    z_m: f64,
}

/// CSVからウェイポイントを読み込み
pub fn load_waypoints_csv(path: &Path) -> Result<Vec<PositionConfig>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ConfigError::Csv(path.to_path_buf(), e))?;

    let mut waypoints = Vec::new();
    for row in reader.deserialize::<WaypointRow>() {
        let row = row.map_err(|e| ConfigError::Csv(path.to_path_buf(), e))?;
        waypoints.push(PositionConfig { x_m: row.x_m, y_m: row.y_m, z_m: row.z_m });
    }
    Ok(waypoints)
}

/// ミッション設定エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ミッションファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {1}", .0.display())]
    Yaml(PathBuf, #[source] serde_yaml::Error),

    #[error("CSV解析エラー {}: {1}", .0.display())]
    Csv(PathBuf, #[source] csv::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSION: &str = r#"
meta:
  version: "1.0"
  name: test
thresholds:
  stop_velocity_mps: 0.2
  stop_time_s: 2.0
  coarse_localization_time_s: 3.0
  fine_localization_time_s: 4.0
  localization_window_radius_m: 1.0
  arrival_radius_m: 1.5
  min_height_m: 2.0
  max_height_m: 30.0
sim:
  tick_period_s: 0.1
  duration_s: 60.0
waypoints:
  - { x_m: 0.0, y_m: 0.0, z_m: -10.0 }
  - { x_m: 20.0, y_m: 0.0, z_m: -10.0 }
cameras:
  - { id: 0, fx_px: 400.0, fy_px: 400.0, width_px: 640.0, height_px: 480.0 }
uas:
  start: { x_m: 0.0, y_m: 0.0, z_m: 0.0 }
  max_speed_mps: 5.0
  max_vertical_speed_mps: 2.0
  response_time_s: 0.5
rgvs:
  - id: 1
    start: { x_m: 10.0, y_m: 2.0 }
    legs:
      - { vx_mps: 1.0, vy_mps: 0.0, duration_s: 5.0 }
"#;

    fn load(yaml: &str) -> Result<MissionConfig, ConfigError> {
        MissionConfig::from_yaml_str(yaml, Path::new("."))
    }

    #[test]
    fn test_load_with_defaults() {
        let config = load(MISSION).unwrap();
        assert_eq!(config.waypoints.len(), 2);
        assert_eq!(config.staleness.telemetry_max_age_s, 0.5);
        assert_eq!(config.fallback.coarse_dwell_timeout_s, 30.0);
        assert_eq!(config.fallback.reacquire_cooldown_s, 10.0);
        assert_eq!(config.offboard.warmup_ticks, 10);
        assert_eq!(config.thresholds.velocity_window, 5);

        let params = config.scheduler_params();
        assert_eq!(params.arrival_radius, 1.5);
        assert!((params.guidance.max_tilt - 20.0_f64.to_radians()).abs() < 1e-12);
        assert_eq!(params.tracker.coarse_localization_time, 3.0);

        let waypoints = config.mission_waypoints();
        assert_eq!(waypoints[1].index, 1);
        assert_eq!(waypoints[1].state.altitude(), 10.0);
        assert_eq!(config.ground_projectors()[0].camera_id(), 0);
    }

    #[test]
    fn test_invalid_height_range_is_rejected() {
        let yaml = MISSION.replace("max_height_m: 30.0", "max_height_m: 1.0");
        assert!(matches!(load(&yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        let yaml = MISSION.replace("stop_time_s: 2.0", "stop_time_s: -2.0");
        let err = load(&yaml).unwrap_err();
        assert!(err.to_string().contains("stop_time_s"));
    }

    #[test]
    fn test_non_finite_tick_period_is_rejected() {
        let yaml = MISSION.replace("tick_period_s: 0.1", "tick_period_s: .nan");
        let err = load(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("tick_period_s")));

        let yaml = MISSION.replace("response_time_s: 0.5", "response_time_s: .inf");
        assert!(matches!(load(&yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_default_fallback_enables_dwell_timeout() {
        let config = load(MISSION).unwrap();
        let params = config.scheduler_params();
        assert_eq!(params.coarse_dwell_timeout, 30.0);
        assert_eq!(params.reacquire_cooldown, 10.0);

        let yaml = format!("{}fallback:\n  coarse_dwell_timeout_s: 0.0\n", MISSION);
        assert!(matches!(load(&yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_missing_waypoints_is_rejected() {
        let yaml = MISSION
            .replace("  - { x_m: 0.0, y_m: 0.0, z_m: -10.0 }\n", "")
            .replace("  - { x_m: 20.0, y_m: 0.0, z_m: -10.0 }\n", "")
            .replace("waypoints:\n", "");
        assert!(matches!(load(&yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_rgv_id_is_rejected() {
        let yaml = MISSION.replace("  - id: 1\n", "  - id: 3\n");
        assert!(matches!(load(&yaml), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_yaml_error_is_reported() {
        assert!(matches!(load("meta: ["), Err(ConfigError::Yaml(_, _))));
    }

    #[test]
    fn test_bundled_missions_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("missions");
        let single = MissionConfig::from_file(dir.join("single_rgv.yaml")).unwrap();
        assert_eq!(single.waypoints.len(), 4);
        assert_eq!(single.rgvs.len(), 1);

        let two = MissionConfig::from_file(dir.join("two_rgv.yaml")).unwrap();
        assert_eq!(two.rgvs.len(), 2);
        assert_eq!(two.fallback.coarse_dwell_timeout_s, 30.0);
    }

    #[test]
    fn test_missing_file() {
        let err = MissionConfig::from_file("/nonexistent/mission.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_waypoints_from_csv() {
        let dir = std::env::temp_dir().join(format!("uasmission-csv-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("route.csv"), "x_m,y_m,z_m\n1.0,2.0,-10.0\n3.0,4.0,-12.0\n").unwrap();

        let yaml = MISSION
            .replace("  - { x_m: 0.0, y_m: 0.0, z_m: -10.0 }\n", "")
            .replace("  - { x_m: 20.0, y_m: 0.0, z_m: -10.0 }\n", "")
            .replace("waypoints:\n", "waypoints_csv: route.csv\n");
        let config = MissionConfig::from_yaml_str(&yaml, &dir).unwrap();
        assert_eq!(
            config.waypoints,
            vec![
                PositionConfig { x_m: 1.0, y_m: 2.0, z_m: -10.0 },
                PositionConfig { x_m: 3.0, y_m: 4.0, z_m: -12.0 },
            ]
        );

        let missing = yaml.replace("route.csv", "absent.csv");
        assert!(matches!(
            MissionConfig::from_yaml_str(&missing, &dir),
            Err(ConfigError::FileNotFound(_))
        ));
        fs::remove_dir_all(&dir).ok();
    }
}
