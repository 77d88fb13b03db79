//! Battery-management-system data: a mutable per-connection assembler
//! ([`SmartBms`]) and the immutable view embedded in [`crate::state::WheelState`]
//! ([`BmsSnapshot`]).

/// The fixed capacity of the per-cell voltage array carried by every
/// [`BmsSnapshot`] (spec §3.2: "fixed-capacity cell array of 56 entries").
pub const MAX_CELLS: usize = 56;

/// An immutable view of one pack's battery-management data, embedded in
/// [`crate::state::WheelState`].
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BmsSnapshot {
    pub serial_number: String,
    pub version_number: String,
    /// mAh.
    pub factory_cap: i32,
    /// mAh.
    pub actual_cap: i32,
    /// mAh.
    pub remaining_cap: i32,
    /// Percent, 0-100.
    pub rem_perc: i32,
    pub full_cycles: i32,
    pub charge_count: i32,
    pub mfg_date_str: String,
    pub status: u16,
    /// 1/100 V.
    pub voltage: i32,
    /// 1/100 A, signed.
    pub current: i32,
    /// 1/100 V.
    pub voltage_sub_pack1: i32,
    /// 1/100 V.
    pub voltage_sub_pack2: i32,
    /// 1/100 °C, six cell-pack temperature sensors.
    pub temps: [i32; 6],
    /// 1/100 °C.
    pub mos_temp: i32,
    /// 1/100 °C.
    pub env_temp: i32,
    /// Percent, 0-100.
    pub humidity: i32,
    /// Per-cell balance bitmap.
    pub balance_map: u64,
    /// Percent, 0-100.
    pub health_perc: i32,
    /// Volts, 3-decimal precision.
    pub min_cell_voltage: f64,
    /// Volts, 3-decimal precision.
    pub max_cell_voltage: f64,
    /// Volts, 3-decimal precision.
    pub avg_cell_voltage: f64,
    /// Volts, 3-decimal precision.
    pub cell_diff: f64,
    /// 1-indexed.
    pub min_cell_index: i32,
    /// 1-indexed.
    pub max_cell_index: i32,
    pub cell_count: usize,
    /// Volts, 3-decimal precision. Only the first [`Self::cell_count`]
    /// entries are meaningful.
    pub cells: [f64; MAX_CELLS],
}

impl Default for BmsSnapshot {
    fn default() -> Self {
        Self {
            serial_number: String::new(),
            version_number: String::new(),
            factory_cap: 0,
            actual_cap: 0,
            remaining_cap: 0,
            rem_perc: 0,
            full_cycles: 0,
            charge_count: 0,
            mfg_date_str: String::new(),
            status: 0,
            voltage: 0,
            current: 0,
            voltage_sub_pack1: 0,
            voltage_sub_pack2: 0,
            temps: [0; 6],
            mos_temp: 0,
            env_temp: 0,
            humidity: 0,
            balance_map: 0,
            health_perc: 0,
            min_cell_voltage: 0.0,
            max_cell_voltage: 0.0,
            avg_cell_voltage: 0.0,
            cell_diff: 0.0,
            min_cell_index: 0,
            max_cell_index: 0,
            cell_count: 0,
            cells: [0.0; MAX_CELLS],
        }
    }
}

/// A mutable working container that assembles a [`BmsSnapshot`] out of
/// multiple sub-pages/sub-packets before flushing it to an immutable view.
///
/// This is the only legitimately shared mutable resource in the core (spec
/// §5): each connection owns one `SmartBms` per pack, the decoder writes into
/// it as sub-frames arrive, and [`Self::recompute_statistics`]/[`Self::to_snapshot`]
/// produce the immutable value a [`crate::state::WheelState`] actually holds.
#[derive(Clone, Debug, Default)]
pub struct SmartBms {
    snapshot: BmsSnapshot,
}

impl SmartBms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct mutable access for decoders assembling sub-pages.
    pub fn inner_mut(&mut self) -> &mut BmsSnapshot {
        &mut self.snapshot
    }

    pub fn inner(&self) -> &BmsSnapshot {
        &self.snapshot
    }

    /// Sets the cell-voltage array (in volts) starting at `start_index` and
    /// updates [`BmsSnapshot::cell_count`] if this grows the known range.
    pub fn set_cells(&mut self, start_index: usize, voltages: &[f64]) {
        for (i, &v) in voltages.iter().enumerate() {
            let idx = start_index + i;
            if idx >= MAX_CELLS {
                break;
            }
            self.snapshot.cells[idx] = v;
            if idx + 1 > self.snapshot.cell_count {
                self.snapshot.cell_count = idx + 1;
            }
        }
    }

    /// Recomputes min/max/avg/diff cell voltage statistics from the currently
    /// known cell array. Spec §4.2.1: Kingsong's balance/MOS-temp sub-page
    /// (0x06) triggers this recompute once all cell pages have arrived.
    pub fn recompute_statistics(&mut self) {
        let count = self.snapshot.cell_count;
        if count == 0 {
            return;
        }

        let cells = &self.snapshot.cells[..count];
        let mut min = cells[0];
        let mut max = cells[0];
        let mut min_idx = 0usize;
        let mut max_idx = 0usize;
        let mut sum = 0.0;

        for (i, &v) in cells.iter().enumerate() {
            sum += v;
            if v < min {
                min = v;
                min_idx = i;
            }
            if v > max {
                max = v;
                max_idx = i;
            }
        }

        self.snapshot.min_cell_voltage = min;
        self.snapshot.max_cell_voltage = max;
        self.snapshot.avg_cell_voltage = sum / count as f64;
        self.snapshot.cell_diff = max - min;
        self.snapshot.min_cell_index = min_idx as i32 + 1;
        self.snapshot.max_cell_index = max_idx as i32 + 1;
    }

    /// Produces the immutable snapshot to embed in a [`crate::state::WheelState`].
    pub fn to_snapshot(&self) -> BmsSnapshot {
        self.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recompute_statistics_on_simple_cells() {
        let mut bms = SmartBms::new();
        bms.set_cells(0, &[4.10, 4.05, 4.12, 4.08]);
        bms.recompute_statistics();
        let snap = bms.inner();
        assert_eq!(snap.cell_count, 4);
        assert!((snap.min_cell_voltage - 4.05).abs() < 1e-9);
        assert!((snap.max_cell_voltage - 4.12).abs() < 1e-9);
        assert_eq!(snap.min_cell_index, 2);
        assert_eq!(snap.max_cell_index, 3);
        assert!(snap.cell_diff > 0.0);
    }

    #[test]
    fn set_cells_ignores_out_of_range_indices() {
        let mut bms = SmartBms::new();
        bms.set_cells(MAX_CELLS - 1, &[1.0, 2.0, 3.0]);
        assert_eq!(bms.inner().cell_count, MAX_CELLS);
    }
}
