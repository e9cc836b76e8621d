mod bool_logic;
mod constant;
mod control_parameter;
mod float;
mod id_compare;
mod vector;

pub use bool_logic::*;
pub use constant::*;
pub use control_parameter::*;
pub use float::*;
pub use id_compare::*;
pub use vector::*;
