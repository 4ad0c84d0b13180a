use gitops_core::types::Outcome;
use gitops_server::gateway::DeploymentView;
use serde::Serialize;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Left-aligned text table; columns are as wide as their widest cell.
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| h.to_string()).collect();
        push_line(&mut out, &header, &widths);
        let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        push_line(&mut out, &sep, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:w$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

// ---------------------------------------------------------------------------
// Deployments
// ---------------------------------------------------------------------------

/// History rows, newest first. Failed attempts carry their error in NOTE.
pub fn deployments_table(deployments: &[DeploymentView]) -> Table {
    let mut table = Table::new(&["VERSION", "COMMIT", "STATUS", "ATTEMPT", "TIME", "NOTE"]);
    for d in deployments {
        let note = match (d.status, &d.error) {
            (Outcome::Failed, Some(err)) => err.clone(),
            _ => String::new(),
        };
        table.push(vec![
            d.version.clone(),
            d.commit.clone(),
            d.status.to_string(),
            d.attempt.to_string(),
            d.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            note,
        ]);
    }
    table
}

pub fn print_deployments(deployments: &[DeploymentView]) {
    print!("{}", deployments_table(deployments).render());
}
