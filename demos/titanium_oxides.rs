use anyhow::Result;
use mpds_client::export::{ExportFormat, Exporter, PlotKind};
use mpds_client::{Client, Fields, ObjectType, Query};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure the key via MPDS_KEY or a `.mpdsrc` file; RUST_LOG=debug shows each page.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = Client::from_env()?;

    let query = Query::new()
        .elements("Ti-O")
        .classes("binary")
        .props("atomic structure")
        .sgs(136);
    println!("{} matching entries", client.count(&query)?);

    for crystal in client.get_crystals(&query)? {
        println!(
            "SG {} cell {:?} basis {}",
            crystal.sg_n,
            crystal.cell_abc,
            crystal.noneq_formula()
        );
    }

    let gaps = Query::new()
        .elements("O")
        .classes("binary")
        .props("band gap");
    let fields = Fields::select().with(
        ObjectType::P,
        [
            "sample.material.chemical_formula",
            "sample.measurement[0].property.scalar",
        ],
    )?;
    let table = client.get_table(&gaps, &fields, Some(&["formula", "bandgap"]))?;
    let path = Exporter::default().save_plot(
        &table,
        &["formula", "bandgap"],
        PlotKind::Bar,
        ExportFormat::Json,
        Default::default(),
    )?;
    println!("band gaps saved to {}", path.display());
    Ok(())
}
