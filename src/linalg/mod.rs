pub(crate) mod qr;

pub use qr::{col_piv_qr_in_place, DynColPivQr};
