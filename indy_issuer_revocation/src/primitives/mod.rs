pub mod identifiers;
pub mod rev_reg_def;
pub mod rev_reg_delta;
