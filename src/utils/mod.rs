//! Utils: 日志初始化与输入校验

pub mod logger;
pub mod validator;
