pub mod traverse;
pub mod view;

pub use traverse::Traverse;
pub use view::{
    Backward, Children, Connect, EnterIf, Filter, Forward, GraphView, SingleVisit, ViewExt,
};
