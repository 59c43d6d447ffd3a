/// Demonstrates the block protocol end to end: control-surface writes,
/// an LFO routed onto a filter cutoff, and a macro riding the mix.
use saavy_params::dsp::shape::LfoShape;
use saavy_params::engine::ParamController;
use saavy_params::modulation::lfo::LfoModulator;
use saavy_params::modulation::macros::MacroModulator;
use saavy_params::modulation::matrix::SourceId;
use saavy_params::modulation::BlockCtx;
use saavy_params::param::{ParamId, ParamRange};
use saavy_params::preset::{build_configs, ConnectionSpec, ModeSpec, ParamSpec};

fn main() {
    println!("=== Modulation Routing Demo ===\n");

    let sample_rate = 48_000.0;
    let block_size = 256;

    // Declare the parameter surface
    let specs = vec![
        ParamSpec::new(
            ParamId(1),
            "Cutoff",
            ModeSpec::new("free", ParamRange::linear(20.0, 20_000.0).with_skew(3.0))
                .with_unit("Hz"),
        )
        .with_default(1_000.0),
        ParamSpec::new(
            ParamId(2),
            "Mix",
            ModeSpec::new("percent", ParamRange::percent()).with_unit("%"),
        )
        .with_default(100.0),
    ];
    let configs = build_configs(&specs).expect("definitions are valid");

    let (mut controller, mut handle) = ParamController::with_edit_queue(configs, sample_rate, 64);

    // Route a 2 Hz sine LFO onto the cutoff and a macro knob onto the mix
    let knob = MacroModulator::new();
    let knob_handle = knob.handle();

    handle.add_source(SourceId(1), Box::new(LfoModulator::new(LfoShape::Sine, 2.0)));
    handle.add_source(SourceId(2), Box::new(knob));
    handle.add_connection(ConnectionSpec::new(SourceId(1), ParamId(1), 0.15));
    handle.add_connection(ConnectionSpec::new(SourceId(2), ParamId(2), -0.5));

    println!("Routing:");
    for spec in handle.connections() {
        println!(
            "  source {} -> param {}  depth {:+.2}",
            spec.source.0, spec.target.0, spec.depth
        );
    }

    // Raise the macro over time, as if dragging a knob; the mix falls with it
    println!("\nblock  cutoff (Hz)  mix (%)  macro");
    let ctx = BlockCtx::new(sample_rate, 120.0);
    for block in 0..24 {
        let level = (block as f32 / 24.0).min(1.0);
        knob_handle.set(level);

        let state = controller.process_block(&ctx, block_size);
        if block % 3 == 0 {
            println!(
                "{:5}  {:11.1}  {:7.1}  {:5.2}",
                block,
                state.ending(0),
                state.ending(1),
                level
            );
        }
    }

    // The control surface can persist everything it set up
    let preset = handle.export_preset();
    println!(
        "\nExported preset: {} params, {} sources, {} connections",
        preset.params.len(),
        preset.sources.len(),
        preset.matrix.entries.len()
    );
}
