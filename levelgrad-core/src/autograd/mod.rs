pub mod function;
pub mod grad_check;

pub use function::Function;
