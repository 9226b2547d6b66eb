// crates/rd_report/src/render_html.rs
//
// Self-contained HTML page: no external assets, no scripts. The template name
// ends in `.html`, so minijinja escapes every interpolated value.

use minijinja::{context, Environment};

use crate::{ReportError, ReportModel};

const TEMPLATE_NAME: &str = "report.html";

const TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ m.cover.title }}</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }
table { border-collapse: collapse; margin: 0.5rem 0 1.5rem; }
th, td { border: 1px solid #ccc; padding: 0.25rem 0.6rem; text-align: left; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
.ok { color: #1a7f37; } .bad { color: #b42318; }
footer { font-size: 0.8rem; color: #666; }
</style>
</head>
<body>
<h1>{{ m.cover.title }}</h1>
<p>Target party <strong>{{ m.cover.target_party }}</strong>, objective <code>{{ m.cover.objective }}</code>,
{% if m.cover.no_loss %}no district may be lost{% else %}losses allowed{% endif %},
compatibility <code>{{ m.cover.compatibility }}</code>, neighbors from <code>{{ m.cover.neighbor_source }}</code>.</p>

<h2>Summary</h2>
<table>
<tr><th>Districts</th><td class="num">{{ m.summary.districts }}</td></tr>
<tr><th>Won before</th><td class="num">{{ m.summary.target_wins_before }} ({{ m.summary.share_before }}%)</td></tr>
<tr><th>Won after</th><td class="num">{{ m.summary.target_wins_after }} ({{ m.summary.share_after }}%)</td></tr>
<tr><th>Net change</th><td class="num">{{ m.summary.gain }}</td></tr>
<tr><th>Committed swaps</th><td class="num">{{ m.summary.committed_swaps }}</td></tr>
<tr><th>Stopped</th><td>{{ m.summary.stop_reason }}</td></tr>
<tr><th>Districts examined</th><td class="num">{{ m.summary.districts_examined }}</td></tr>
<tr><th>Evaluations</th><td class="num">{{ m.summary.evaluations }}</td></tr>
</table>

<h2>Swaps</h2>
{% if m.swaps %}
<table>
<tr><th>From PC</th><th>Unit</th><th>To PC</th><th>Unit</th><th>Before</th><th>After</th></tr>
{% for s in m.swaps %}<tr><td>{{ s.from_pc }}</td><td>{{ s.from_assembly }}</td><td>{{ s.to_pc }}</td><td>{{ s.to_assembly }}</td><td>{{ s.before }}</td><td>{{ s.after }}</td></tr>
{% endfor %}</table>
{% else %}<p>No swaps committed.</p>{% endif %}

<h2>Districts after search</h2>
<table>
<tr><th>PC</th><th>Winner</th><th>Margin</th><th>Margin %</th><th>Valid votes</th><th>Units</th></tr>
{% for d in m.districts %}<tr><td>{{ d.pc }}</td><td>{{ d.winner }}</td><td class="num">{{ d.margin }}</td><td class="num">{{ d.margin_pct }}</td><td class="num">{{ d.valid_votes }}</td><td class="num">{{ d.assemblies }}</td></tr>
{% endfor %}</table>

<h2>Verification</h2>
{% if m.verification.clean %}<p class="ok">Replay agrees with every recorded winner.</p>
{% else %}<p class="bad">{{ m.verification.discrepancies }} discrepancies found.</p>{% endif %}
<p>Votes verified: {{ m.verification.total_votes_verified }}; winning votes: {{ m.verification.winning_votes_verified }}.</p>
{% if m.verification.mismatches %}<ul>{% for x in m.verification.mismatches %}<li>{{ x }}</li>{% endfor %}</ul>{% endif %}
{% if m.verification.replay_errors %}<ul>{% for x in m.verification.replay_errors %}<li>{{ x }}</li>{% endfor %}</ul>{% endif %}
{% if m.verification.flipped %}<h3>Flipped districts</h3>
<ul>{% for x in m.verification.flipped %}<li>{{ x }}</li>{% endfor %}</ul>{% endif %}

{% if m.screen %}
<h2>Vulnerable units (margin below {{ m.screen.threshold }}%)</h2>
<p>{{ m.screen.flagged }} flagged.</p>
<table>
<tr><th>Unit</th><th>PC</th><th>Winner</th><th>Margin %</th><th>Neighbors</th></tr>
{% for r in m.screen.rows %}<tr><td>{{ r.assembly }}</td><td>{{ r.pc }}</td><td>{{ r.winner }}</td><td class="num">{{ r.margin_pct }}</td><td>{{ r.neighbors | join(", ") }}</td></tr>
{% endfor %}</table>
{% endif %}

<h2>Diagnostics</h2>
<table>
<tr><th>Records read</th><td class="num">{{ m.diagnostics.records_read }}</td></tr>
<tr><th>Entries skipped on load</th><td class="num">{{ m.diagnostics.loader_skipped }}</td></tr>
<tr><th>Malformed numbers</th><td class="num">{{ m.diagnostics.malformed_numeric }}</td></tr>
<tr><th>Missing references</th><td class="num">{{ m.diagnostics.missing_references }}</td></tr>
<tr><th>Validation warnings</th><td class="num">{{ m.diagnostics.validation_warnings }}</td></tr>
</table>

<footer>
<p>{{ m.integrity.run_id }} · {{ m.integrity.engine_vendor }}/{{ m.integrity.engine_name }} {{ m.integrity.engine_version }} ({{ m.integrity.engine_build }})</p>
<ul>{% for i in m.integrity.inputs %}<li>{{ i.name }}: <code>{{ i.sha256 }}</code></li>{% endfor %}</ul>
</footer>
</body>
</html>
"#;

pub fn render_html(model: &ReportModel) -> Result<String, ReportError> {
    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)
        .map_err(|_| ReportError::Template("add_template"))?;
    let tmpl = env
        .get_template(TEMPLATE_NAME)
        .map_err(|_| ReportError::Template("get_template"))?;
    tmpl.render(context! { m => model })
        .map_err(|_| ReportError::Template("render_html"))
}
