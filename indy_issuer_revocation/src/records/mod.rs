pub mod cred_rev_record;
pub mod rev_notification_record;
pub mod rev_reg_record;
