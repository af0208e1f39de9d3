// SPDX-License-Identifier: Apache-2.0

use std::io;

use crate::analysis::switching::SwitchActivity;
use crate::model::object::ObjectStore;
use crate::model::subnet::Subnet;

/// Writes one `;`-delimited line per entry of `subnet` after a header.
/// Toggle counts are included for simulated activity only.
pub fn write_report(
    activity: &SwitchActivity,
    store: &ObjectStore,
    subnet: &Subnet,
    mut w: impl io::Write,
) -> io::Result<()> {
    assert_eq!(
        activity.len(),
        subnet.size(),
        "activity of {} entries reported against a subnet of {}",
        activity.len(),
        subnet.size()
    );
    let simulated = activity.ticks > 0;
    write!(w, "index;type;arity;switching;on_state")?;
    if simulated {
        write!(w, ";switches_on;switches_off")?;
    }
    writeln!(w)?;
    for (i, cell) in subnet.entries().iter().enumerate() {
        write!(
            w,
            "{};{};{};{:.6};{:.6}",
            i,
            store.cell_type_name(cell.type_id),
            cell.arity(),
            activity.switching[i],
            activity.on_state[i]
        )?;
        if simulated {
            write!(w, ";{};{}", activity.switches_on[i], activity.switches_off[i])?;
        }
        writeln!(w)?;
    }
    Ok(())
}
