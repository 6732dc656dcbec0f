pub mod ast;

pub use ast::find_locator_call;
