// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントとカメラモデルの基本インターフェース（trait）定義
pub mod traits;

// UAS・RGVの状態とウェイポイント
pub mod vehicle_state;

// 追跡と関連付け
pub mod rgv_track;
pub mod association;
pub mod camera;

// シミュレーション用の真値モデル
pub mod ground_target;
pub mod uas_model;
