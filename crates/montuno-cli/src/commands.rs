use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use montuno::{chord::pitch_name, Harmonization, RhythmPattern, SlotSpan};
use montuno_conf::{ConfigSources, MontunoConfig, TemplateConfig};
use montuno_midi::{performance_to_midi, read_reference, ExportOptions};
use serde::Serialize;

pub struct RenderArgs {
    pub progression: Option<String>,
    pub file: Option<PathBuf>,
    pub template: Option<String>,
    pub reference: Option<PathBuf>,
    pub harmonization: Option<String>,
    pub output: Option<PathBuf>,
}

pub fn render(config: &MontunoConfig, args: RenderArgs) -> Result<()> {
    let text = progression_text(args.progression, args.file.as_deref())?;
    let (name, template, pattern) = resolve_template(config, args.template.as_deref())?;
    let style = default_style(config, args.harmonization.as_deref())?;

    let reference_path = args
        .reference
        .unwrap_or_else(|| config.reference_path(template));
    let bytes = std::fs::read(&reference_path)
        .with_context(|| format!("Failed to read reference {}", reference_path.display()))?;
    let reference = read_reference(&bytes)
        .with_context(|| format!("Failed to parse reference {}", reference_path.display()))?;

    tracing::info!(
        template = name,
        reference = %reference_path.display(),
        bpm = reference.performance.bpm,
        "rendering montuno"
    );

    let arrangement = montuno::arrange(&text, &pattern, &reference.performance, style)
        .context("Failed to arrange progression")?;

    let midi = performance_to_midi(
        &arrangement.notes,
        arrangement.bpm,
        &reference.track,
        &ExportOptions { ppq: reference.ppq },
    );

    let output = match args.output {
        Some(path) => path,
        None => default_output_path(&reference_path)?,
    };
    std::fs::write(&output, midi)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} chords, {} bars, {} notes)",
        output.display(),
        arrangement.schedule.assignments.len(),
        arrangement.schedule.bar_count,
        arrangement.notes.len()
    );
    Ok(())
}

#[derive(Serialize)]
struct Plan<'a> {
    template: &'a str,
    bar_count: usize,
    destination_slots: u32,
    chords: Vec<PlannedChord>,
}

#[derive(Serialize)]
struct PlannedChord {
    chord: String,
    slots: SlotSpan,
    harmonization: Option<Harmonization>,
    voicing: [u8; 4],
    pitches: Vec<String>,
}

pub fn plan(
    config: &MontunoConfig,
    progression: Option<String>,
    file: Option<PathBuf>,
    template: Option<String>,
    harmonization: Option<String>,
) -> Result<()> {
    let text = progression_text(progression, file.as_deref())?;
    let (name, _, pattern) = resolve_template(config, template.as_deref())?;
    let style = default_style(config, harmonization.as_deref())?;

    let schedule =
        montuno::schedule(&text, &pattern, style).context("Failed to schedule progression")?;
    let voicings = montuno::generate(&schedule.chords());

    let chords = schedule
        .assignments
        .iter()
        .zip(&voicings)
        .map(|(assignment, voicing)| PlannedChord {
            chord: assignment.chord.to_string(),
            slots: assignment.slots,
            harmonization: assignment.harmonization,
            voicing: voicing.pitches,
            pitches: voicing.pitches.iter().map(|&p| pitch_name(p)).collect(),
        })
        .collect();

    let plan = Plan {
        template: name,
        bar_count: schedule.bar_count,
        destination_slots: schedule.destination_slots(),
        chords,
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

pub fn templates(config: &MontunoConfig) -> Result<()> {
    for (name, template) in &config.templates {
        let marker = if *name == config.defaults.template { "*" } else { " " };
        println!(
            "{} {:<10} lead-in {:?}, steady {:?}  {}",
            marker,
            name,
            template.lead_in,
            template.steady,
            config.reference_path(template).display()
        );
    }
    Ok(())
}

pub fn show_config(config: &MontunoConfig, sources: &ConfigSources) -> Result<()> {
    for file in &sources.files {
        println!("# loaded: {}", file.display());
    }
    for var in &sources.env_overrides {
        println!("# env: {}", var);
    }
    print!("{}", config.to_toml());
    Ok(())
}

fn progression_text(progression: Option<String>, file: Option<&Path>) -> Result<String> {
    match (progression, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read progression {}", path.display())),
        (None, None) => bail!("No progression given (pass it as an argument or with --file)"),
    }
}

fn resolve_template<'a>(
    config: &'a MontunoConfig,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a TemplateConfig, RhythmPattern)> {
    let name = name.unwrap_or(&config.defaults.template);
    let template = config.template(name)?;
    let pattern = template
        .pattern()
        .with_context(|| format!("Template {:?} has an invalid rhythm pattern", name))?;
    Ok((name, template, pattern))
}

fn default_style(config: &MontunoConfig, flag: Option<&str>) -> Result<Option<Harmonization>> {
    match flag {
        Some(value) => montuno_conf::parse_harmonization(value)
            .with_context(|| format!("Invalid --harmonization {:?}", value)),
        None => Ok(config.defaults.harmonization),
    }
}

/// `<stem>_montuno.mid` beside the reference.
fn default_output_path(reference: &Path) -> Result<PathBuf> {
    let stem = reference
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Reference {} has no file name", reference.display()))?;
    Ok(reference.with_file_name(format!("{}_montuno.mid", stem)))
}
