//! 辅助宏

/// 为结构体实现 Default trait
///
/// 使用示例:
/// ```rust
/// use scouts_bridge::impl_default;
///
/// struct Limits {
///     plays: u32,
///     label: String,
/// }
///
/// impl_default!(Limits {
///     plays: 2,
///     label: String::from("standard"),
/// });
///
/// assert_eq!(Limits::default().plays, 2);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}
