use crate::cli::{Cli, Command, TransformArgs};
use crate::core::compression::CompressionHandler;
use crate::core::engine::{TransformationEngine, TransformationOptions};
use crate::core::instructions::ManualInstructionsWriter;
use crate::core::registry::ExtensionRegistry;
use crate::core::report::TransformationOutcome;
use crate::core::validation::TemplateValidator;
use anyhow::{bail, Context, Result};
use butterfly_extensions::{Condition, Node, Template};
use butterfly_utilities::{AddProperty, FindFiles, StringFormat};
use std::fs;
use std::time::Duration;

pub fn run(cli: Cli) -> Result<()> {
    let engine = TransformationEngine::new(
        built_in_registry(),
        TemplateValidator::new(),
        ManualInstructionsWriter::new(),
        CompressionHandler::new(),
    );
    match cli.command {
        Command::Transform(args) => transform(&engine, args),
        Command::Templates => {
            for name in engine.registry().names() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn transform(engine: &TransformationEngine, args: TransformArgs) -> Result<()> {
    let options = TransformationOptions {
        output_folder: args.output,
        zip_output: args.zip,
        modify_original_folder: args.in_place,
        timeout: args.timeout.map(Duration::from_secs),
        ..TransformationOptions::default()
    };
    let report = engine
        .transform_registered(&args.source, &args.template, &options)
        .with_context(|| format!("transformation '{}' failed", args.template))?;

    println!("outcome: {}", report.outcome);
    println!("transformed folder: {}", report.transformed_folder.display());
    if let Some(instructions) = &report.manual_instructions {
        println!("manual instructions: {}", instructions.display());
    }
    if let Some(archive) = &report.archive {
        println!("archive: {}", archive.display());
    }

    if let Some(report_path) = &args.report {
        let rendered = serde_json::to_string_pretty(&report.summary())
            .context("failed to serialize report")?;
        fs::write(report_path, rendered)
            .with_context(|| format!("failed to write {}", report_path.display()))?;
        println!("report: {}", report_path.display());
    }

    if report.outcome == TransformationOutcome::Incomplete {
        bail!("transformation finished INCOMPLETE");
    }
    Ok(())
}

/// Templates shipped with the CLI. Hosts embedding the engine register
/// their own extensions instead.
fn built_in_registry() -> ExtensionRegistry {
    let mut builder = ExtensionRegistry::builder();
    builder.register("properties-sample", properties_sample);
    builder.build()
}

/// Demo template: stamp an environment marker into every properties file.
fn properties_sample() -> Template {
    let mut template = Template::new("properties-sample")
        .with_description("Add a butterfly marker property to every properties file");
    let find = FindFiles::new(r"\.properties$", true).expect("static pattern");
    template
        .add(Node::utility("find-properties", find).save_result_as("properties_files"))
        .and_then(|template| {
            template.add(Node::multiple(
                "stamp-marker",
                AddProperty::new("butterfly.transformed", "true"),
                ["properties_files"],
            ))
        })
        .and_then(|template| {
            template.add(
                Node::utility(
                    "describe-run",
                    StringFormat::new("Stamped files: %s")
                        .with_attribute_names(["properties_files"]),
                )
                .only_if(Condition::expr("context.properties_files != ()"))
                .save_result_as("run_summary"),
            )
        })
        .expect("static template is well formed");
    template
}
