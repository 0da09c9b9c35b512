use crate::{Error, Result};

/// Fills an objective template's single `%s` with the subject. `%%` renders as `%`.
pub fn render_objective(template: &str, subject: &str) -> Result<String> {
	let invalid = || Error::InvalidTemplate { template: template.to_string() };
	let mut out = String::with_capacity(template.len() + subject.len());
	let mut placeholders = 0;
	let mut chars = template.chars();

	while let Some(ch) = chars.next() {
		if ch != '%' {
			out.push(ch);

			continue;
		}

		match chars.next() {
			Some('%') => out.push('%'),
			Some('s') => {
				placeholders += 1;

				out.push_str(subject);
			},
			_ => return Err(invalid()),
		}
	}

	if placeholders != 1 {
		return Err(invalid());
	}

	Ok(out)
}
