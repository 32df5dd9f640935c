//! The transformer stack.
//!
//! Three stages run between lowering and validation, in a fixed order:
//! variable resolution, template expansion, loop unrolling. Each stage
//! takes ownership of the IR and returns a new one. The expander runs a
//! second time after unrolling because cloned loop bodies may carry
//! template spreads of their own.

mod loops;
mod templates;
mod variables;
pub(crate) mod visit;

pub use loops::LoopUnroller;
pub use templates::TemplateExpander;
pub use variables::VariableResolver;

use crate::error::{ParseError, ValidationWarning};
use crate::ir::ConfigIR;

/// Run the full transformer stack in pipeline order.
pub fn run_all(
    ir: ConfigIR,
    warnings: &mut Vec<ValidationWarning>,
) -> Result<ConfigIR, ParseError> {
    let ir = VariableResolver::new(ir).resolve()?;
    let ir = TemplateExpander::new(ir).expand(warnings);
    let ir = LoopUnroller::new(ir).unroll()?;
    // Loop bodies may have carried spreads into the cloned entities.
    let ir = TemplateExpander::new(ir).expand(warnings);
    Ok(ir)
}
