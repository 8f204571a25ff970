use crate::application::payment::PaymentService;
use crate::domain::booking::Company;
use crate::domain::ports::SharedCompanyStore;
use crate::error::Result;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Registers companies together with their settlement subaccount.
pub struct CompanyOnboarding {
    companies: SharedCompanyStore,
    payments: Arc<PaymentService>,
}

impl CompanyOnboarding {
    pub fn new(companies: SharedCompanyStore, payments: Arc<PaymentService>) -> Self {
        Self {
            companies,
            payments,
        }
    }

    /// Creates the company and its gateway subaccount.
    ///
    /// A company without a subaccount cannot be charged for, so when the subaccount
    /// step fails the company is deleted again before the error is returned.
    #[instrument(skip(self, company), fields(name = %company.name))]
    pub async fn register(&self, company: Company) -> Result<Company> {
        let company = self.companies.create(company).await?;

        if let Err(e) = self.payments.create_subaccount(&company).await {
            if let Err(rollback) = self.companies.delete(&company.id).await {
                error!(
                    company_id = %company.id,
                    error = %e,
                    rollback_error = %rollback,
                    "subaccount creation failed and company rollback failed"
                );
            } else {
                info!(company_id = %company.id, error = %e, "subaccount creation failed, company removed");
            }
            return Err(e);
        }

        info!(company_id = %company.id, "company registered");
        Ok(company)
    }
}
