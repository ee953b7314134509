mod period;
mod quota;
mod roster;
mod turn;
mod validate;

pub use period::*;
pub use quota::*;
pub use roster::*;
pub use turn::*;
pub use validate::*;
