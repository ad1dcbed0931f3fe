use crate::output::{print_json, print_table};
use review_core::{rules, types::Domain};

pub fn run(domain: &str, json: bool) -> anyhow::Result<()> {
    let domain: Domain = domain.parse()?;
    let table = rules::table(domain);

    if json {
        let checks: Vec<_> = table
            .checks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id(),
                    "shape": c.shape(),
                    "category": c.category(),
                    "title": c.title(),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "domain": domain,
            "rules": checks,
        }))?;
        return Ok(());
    }

    let rows = table
        .checks
        .iter()
        .map(|c| {
            vec![
                c.id().to_string(),
                c.shape().to_string(),
                c.category().to_string(),
                c.title().to_string(),
            ]
        })
        .collect();
    println!("{}", domain.title());
    print_table(&["RULE", "SHAPE", "CATEGORY", "TITLE"], rows);
    Ok(())
}
