use crate::models::common::Position3D;
use crate::models::vehicle_state::VehicleState;

/// シミュレーション上の真値エージェントが実装する基本インターフェース
pub trait IAgent {
    /// 1ティックの処理実行
    fn tick(&mut self, dt: f64);

    /// エージェントIDの取得
    fn get_id(&self) -> String;

    /// エージェントがアクティブかどうか
    fn is_active(&self) -> bool;
}

/// カメラ画素と地上座標の対応付け（カメラモデルの境界）
///
/// 内部/外部パラメータの扱いは外部の責務で、ここでは
/// 画素⇔地上点の変換だけを要求します。
pub trait IGroundProjector {
    /// カメラID
    fn camera_id(&self) -> usize;

    /// 画素座標を地上点（z = 0）へ逆投影
    ///
    /// 高度が0以下などで投影できない場合はNone
    fn pixel_to_ground(&self, uas: &VehicleState, u: f64, v: f64) -> Option<Position3D>;

    /// 地上点を画素座標へ投影
    ///
    /// 画像範囲外の場合はNone
    fn ground_to_pixel(&self, uas: &VehicleState, point: &Position3D) -> Option<(f64, f64)>;
}
