//! Model backends for [`Generator`](crate::traits::Generator).
//!
//! Only compiled with the `openai` feature. Anything that can answer a prompt
//! about a page image can implement the trait instead.

mod openai;

pub use openai::OpenAIGenerator;
