//! One linear analysis: package, then invoice, then reconciliation.
//!
//! Slots are only written through the pipeline operations. Starting a
//! stage clears that stage and everything downstream of it, so a failed
//! call leaves its slot empty and no stale invoice or report can outlive
//! the package it was derived from.

use crate::error::SessionError;
use crate::extractor::{self, ExtractionRequest};
use crate::reconcile;
use crate::types::{ExtractionResult, ImageRole, ReconciliationReport, Verdict};
use crate::verdict;
use crate::vision::ChatModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Empty,
    PackageReady,
    ReadyToReconcile,
    Reconciled,
}

#[derive(Debug, Default, Clone)]
struct Slots {
    package: Option<ExtractionResult>,
    invoice: Option<ExtractionResult>,
    report: Option<ReconciliationReport>,
}

pub struct Session<M: ChatModel> {
    model: M,
    slots: Slots,
}

impl<M: ChatModel> Session<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            slots: Slots::default(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn package(&self) -> Option<&ExtractionResult> {
        self.slots.package.as_ref()
    }

    pub fn invoice(&self) -> Option<&ExtractionResult> {
        self.slots.invoice.as_ref()
    }

    pub fn report(&self) -> Option<&ReconciliationReport> {
        self.slots.report.as_ref()
    }

    /// Derived from the current report; never stored.
    pub fn verdict(&self) -> Option<Verdict> {
        self.slots.report.as_ref().map(verdict::resolve)
    }

    pub fn stage(&self) -> Stage {
        match (&self.slots.package, &self.slots.invoice, &self.slots.report) {
            (_, _, Some(_)) => Stage::Reconciled,
            (Some(_), Some(_), None) => Stage::ReadyToReconcile,
            (Some(_), None, None) => Stage::PackageReady,
            _ => Stage::Empty,
        }
    }

    /// Extract the package image. Invalidates any invoice extraction and report.
    pub fn analyze_package(&mut self, request: ExtractionRequest) -> Result<&ExtractionResult, SessionError> {
        if self.slots.invoice.is_some() || self.slots.report.is_some() {
            tracing::info!("New package analysis; discarding invoice extraction and report");
        }
        self.slots = Slots::default();

        if request.role() != ImageRole::Package {
            tracing::debug!(given = %request.role(), "Treating request as the package image");
        }
        let result = extractor::extract(&self.model, &request.with_role(ImageRole::Package))
            .map_err(|e| {
                tracing::error!("Package extraction failed: {}", e);
                e
            })?;
        tracing::info!(chars = result.raw_text.len(), "Package extraction stored");
        Ok(self.slots.package.insert(result))
    }

    /// Extract the invoice image. Requires a package extraction; invalidates the report.
    pub fn analyze_invoice(&mut self, request: ExtractionRequest) -> Result<&ExtractionResult, SessionError> {
        if self.slots.package.is_none() {
            return Err(SessionError::MissingExtraction(ImageRole::Package));
        }
        self.slots.invoice = None;
        self.slots.report = None;

        if request.role() != ImageRole::Invoice {
            tracing::debug!(given = %request.role(), "Treating request as the invoice image");
        }
        let result = extractor::extract(&self.model, &request.with_role(ImageRole::Invoice))
            .map_err(|e| {
                tracing::error!("Invoice extraction failed: {}", e);
                e
            })?;
        tracing::info!(chars = result.raw_text.len(), "Invoice extraction stored");
        Ok(self.slots.invoice.insert(result))
    }

    /// Compare both extractions. A reply without a usable verdict block still
    /// produces a report; its verdict is then undetermined.
    pub fn reconcile(&mut self) -> Result<&ReconciliationReport, SessionError> {
        let package = self
            .slots
            .package
            .as_ref()
            .ok_or(SessionError::MissingExtraction(ImageRole::Package))?;
        let invoice = self
            .slots
            .invoice
            .as_ref()
            .ok_or(SessionError::MissingExtraction(ImageRole::Invoice))?;

        let outcome = reconcile::reconcile(&self.model, &package.raw_text, &invoice.raw_text);
        self.slots.report = None;
        let report = outcome.map_err(|e| {
            tracing::error!("Reconciliation failed: {}", e.user_message());
            e
        })?;
        tracing::info!(verdict = %verdict::resolve(&report), "Reconciliation stored");
        Ok(self.slots.report.insert(report))
    }

    /// Back to an empty session in one step.
    pub fn reset(&mut self) {
        self.slots = Slots::default();
        tracing::info!("Session reset");
    }
}
