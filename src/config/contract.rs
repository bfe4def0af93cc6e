use crate::codec::WireGeneration;
use crate::impl_default;
use crate::marshal::CallConvention;
use serde::{Deserialize, Serialize};

/// 引擎契约配置
///
/// 两种编码代际与两种调用约定都无法在运行时自动识别，必须与引擎构建保持一致。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// 走法编码代际
    pub generation: WireGeneration,

    /// 调用约定
    pub convention: CallConvention,

    /// 要求引擎导出全部六个操作
    pub strict_surface: bool,
}

impl_default!(ContractConfig {
    generation: WireGeneration::Compact,
    convention: CallConvention::Tuple,
    strict_surface: true,
});
