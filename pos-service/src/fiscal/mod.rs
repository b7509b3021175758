//! Fiscal invoice submission pipeline.
//!
//! The pipeline is three stages behind one interface: a pure payload
//! transformer, an authority client (live HTTP or canned mock), and a
//! submission client that owns retries and outcome classification. Callers
//! always receive a uniform [`SubmissionOutcome`]; transport failures never
//! escape this module as errors.

pub mod authority;
pub mod payload;
pub mod retry;
pub mod submit;

pub use authority::{AuthorityClient, AuthorityError, AuthorityReply, HttpAuthorityClient, MockAuthorityClient};
pub use payload::{
    build_payload, vat_breakdown, FiscalInvoice, FiscalLineItem, InvoiceSource, SourceLineItem,
    StandardVatRule, TaxClass, TaxRule, TransformError,
};
pub use retry::RetryPolicy;
pub use submit::{SubmissionClient, SubmissionOutcome, SuccessRule, ACCEPTED_RESULT_CODE};
