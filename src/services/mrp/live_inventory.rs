use std::collections::HashMap;

use rust_decimal::Decimal;

/// Which pools a consumption is allowed to draw from, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPreference {
    /// Finished-good shippable pass: approved stock only.
    ApprovedOnly,
    /// The Pending-QC probe: approved plus QC-held, probe only.
    ApprovedAndQc,
    /// Component producibility: approved, then QC-pending, then open PO.
    AllPools,
}

/// Breakdown of a single consumption across the three pools.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolDraw {
    pub approved: Decimal,
    pub qc: Decimal,
    pub po: Decimal,
}

impl PoolDraw {
    pub fn total(&self) -> Decimal {
        self.approved + self.qc + self.po
    }
}

/// One recorded consumption: which SO took how much, by pool.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRecord {
    pub so_number: String,
    pub draw: PoolDraw,
}

#[derive(Debug, Default)]
struct PartLedger {
    initial_approved: Decimal,
    initial_qc: Decimal,
    initial_po: Decimal,
    approved: Decimal,
    qc: Decimal,
    po: Decimal,
    allocations: Vec<AllocationRecord>,
}

/// The in-memory mutable ledger for one allocation run.
///
/// `consume` mutates pool remainders; `record_allocation` only appends to the
/// per-part log. Keeping them separate lets the two-pass producibility
/// computation probe availability without dirtying state.
#[derive(Debug, Default)]
pub struct LiveInventory {
    parts: HashMap<String, PartLedger>,
}

impl LiveInventory {
    pub fn new(
        approved: &HashMap<String, Decimal>,
        qc_pending: &HashMap<String, Decimal>,
        open_po: &HashMap<String, Decimal>,
    ) -> Self {
        let mut parts: HashMap<String, PartLedger> = HashMap::new();
        for (part, qty) in approved {
            let ledger = parts.entry(part.clone()).or_default();
            ledger.initial_approved = *qty;
            ledger.approved = *qty;
        }
        for (part, qty) in qc_pending {
            let ledger = parts.entry(part.clone()).or_default();
            ledger.initial_qc = *qty;
            ledger.qc = *qty;
        }
        for (part, qty) in open_po {
            let ledger = parts.entry(part.clone()).or_default();
            ledger.initial_po = *qty;
            ledger.po = *qty;
        }
        Self { parts }
    }

    /// Deducts up to `qty` from the preferred pools in order. The returned
    /// draw totals `min(qty, available)`; unknown parts yield a zero draw.
    pub fn consume(&mut self, part: &str, qty: Decimal, preference: PoolPreference) -> PoolDraw {
        let mut draw = PoolDraw::default();
        if qty <= Decimal::ZERO {
            return draw;
        }
        let Some(ledger) = self.parts.get_mut(part) else {
            return draw;
        };

        let mut wanted = qty;
        draw.approved = wanted.min(ledger.approved);
        ledger.approved -= draw.approved;
        wanted -= draw.approved;

        if preference == PoolPreference::AllPools && wanted > Decimal::ZERO {
            draw.qc = wanted.min(ledger.qc);
            ledger.qc -= draw.qc;
            wanted -= draw.qc;

            if wanted > Decimal::ZERO {
                draw.po = wanted.min(ledger.po);
                ledger.po -= draw.po;
            }
        }
        draw
    }

    /// Non-destructive availability under the given pool preference.
    pub fn available(&self, part: &str, preference: PoolPreference) -> Decimal {
        let Some(ledger) = self.parts.get(part) else {
            return Decimal::ZERO;
        };
        match preference {
            PoolPreference::ApprovedOnly => ledger.approved,
            PoolPreference::ApprovedAndQc => ledger.approved + ledger.qc,
            PoolPreference::AllPools => ledger.approved + ledger.qc + ledger.po,
        }
    }

    /// Current (approved, qc_pending, open_po) remainders.
    pub fn remaining(&self, part: &str) -> (Decimal, Decimal, Decimal) {
        self.parts
            .get(part)
            .map(|l| (l.approved, l.qc, l.po))
            .unwrap_or_default()
    }

    /// Appends to the per-part allocation log. Tooltip bookkeeping only; pool
    /// remainders are untouched.
    pub fn record_allocation(&mut self, part: &str, so_number: &str, draw: PoolDraw) {
        if draw.total() <= Decimal::ZERO {
            return;
        }
        self.parts
            .entry(part.to_string())
            .or_default()
            .allocations
            .push(AllocationRecord {
                so_number: so_number.to_string(),
                draw,
            });
    }

    /// Allocations recorded for `part` by SOs other than `exclude_so`, in
    /// recording order.
    pub fn prior_allocations(&self, part: &str, exclude_so: &str) -> Vec<(String, Decimal)> {
        self.parts
            .get(part)
            .map(|ledger| {
                ledger
                    .allocations
                    .iter()
                    .filter(|a| a.so_number != exclude_so)
                    .map(|a| (a.so_number.clone(), a.draw.total()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks that the allocation log agrees with the pool remainders for
    /// every part: `initial - consumed == remaining`, remainders >= 0.
    pub fn verify_conservation(&self, tolerance: Decimal) -> Result<(), String> {
        for (part, ledger) in &self.parts {
            let consumed = ledger
                .allocations
                .iter()
                .fold(PoolDraw::default(), |mut acc, a| {
                    acc.approved += a.draw.approved;
                    acc.qc += a.draw.qc;
                    acc.po += a.draw.po;
                    acc
                });
            let checks = [
                ("approved", ledger.initial_approved, consumed.approved, ledger.approved),
                ("qc_pending", ledger.initial_qc, consumed.qc, ledger.qc),
                ("open_po", ledger.initial_po, consumed.po, ledger.po),
            ];
            for (pool, initial, used, remaining) in checks {
                if remaining < -tolerance || (initial - used - remaining).abs() > tolerance {
                    return Err(format!(
                        "part {part} pool {pool}: initial {initial} - consumed {used} != remaining {remaining}"
                    ));
                }
            }
        }
        Ok(())
    }
}
