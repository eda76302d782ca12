//! Catalog queries: `tagwatch products` and `tagwatch tag <epc>`.

use serde::Serialize;
use tabled::Tabled;

use tagwatch_core::{Product, Registration};

use crate::cli::{GlobalOpts, TagArgs};
use crate::commands::scan::Workbench;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ProductRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Attributes")]
    attributes: String,
}

fn format_attributes(product: &Product) -> String {
    product
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn products(global: &GlobalOpts) -> Result<(), CliError> {
    let bench = Workbench::build(global, |_| {})?;
    let products = bench.engine.list_products().await;
    bench.engine.shutdown().await;
    let products = products?;

    let out = output::render_list(
        &global.output,
        &products,
        |p| ProductRow {
            id: p.id.clone(),
            description: p.description.clone().unwrap_or_default(),
            attributes: format_attributes(p),
        },
        Product::label,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Serialize)]
struct TagDetail {
    epc: String,
    #[serde(flatten)]
    registration: Registration,
}

fn detail(tag: &TagDetail) -> String {
    let mut lines = vec![format!("EPC:          {}", tag.epc)];
    match &tag.registration {
        Registration::Unregistered => lines.push("Status:       unregistered".into()),
        Registration::Registered {
            product_id,
            product,
        } => {
            lines.push("Status:       registered".into());
            lines.push(format!(
                "Product:      {}",
                product_id.as_deref().unwrap_or("-")
            ));
            if let Some(product) = product {
                if let Some(desc) = &product.description {
                    lines.push(format!("Description:  {desc}"));
                }
                for (key, value) in &product.attributes {
                    let label = format!("{key}:");
                    lines.push(format!("{label:<13} {value}"));
                }
            }
        }
    }
    lines.join("\n")
}

pub async fn tag(args: TagArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let bench = Workbench::build(global, |_| {})?;
    let epc = args.epc.trim().to_uppercase();
    let registration = bench.engine.describe_tag(&epc).await;
    bench.engine.shutdown().await;
    let registration = registration?;

    let data = TagDetail { epc, registration };
    let out = output::render_single(&global.output, &data, detail, |t| t.registration.label());
    output::print_output(&out, global.quiet);
    Ok(())
}
