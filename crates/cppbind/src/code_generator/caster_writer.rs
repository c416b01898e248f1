//! Custom type caster units
//!
//! Each configured opaque type gets a `pybind11::detail::type_caster`
//! specialization. `load` calls the acceptance hook after checking the host
//! value against the configured host type; `cast` calls the production hook
//! for the supported return value policies. A missing hook or an unsupported
//! policy raises at runtime with the matching error name.
//!
//! Hook signatures expected in the configured header:
//!
//! ```text
//! T accept(py::handle src, bool convert);
//! py::object produce(const T &value, py::return_value_policy policy, py::handle parent);
//! ```

use std::fmt::Write;

use super::{FILE_EXTENSION, RegistrationUnit, push_prefix};
use crate::{
    cpp_types,
    plan::{CasterPlan, WrapPlan},
};

fn quote_header(header: &str) -> String {
    if header.starts_with('<') || header.starts_with('"') {
        header.to_owned()
    } else {
        format!("\"{header}\"")
    }
}

fn write_load(out: &mut String, caster: &CasterPlan) {
    let opaque = &caster.opaque_type;
    let host = &caster.host_type;
    match &caster.accept {
        Some(accept) => {
            out.push_str("    bool load(handle src, bool convert)\n    {\n");
            let _ = writeln!(out, "        if (!pybind11::isinstance<{host}>(src))\n        {{");
            let _ = writeln!(
                out,
                "            throw pybind11::type_error(\"TypeMismatch: expected {host} for \
                 {opaque}\");"
            );
            out.push_str("        }\n");
            let _ = writeln!(out, "        value = {accept}(src, convert);");
            out.push_str("        return true;\n    }\n");
        }
        None => {
            out.push_str("    bool load(handle, bool)\n    {\n");
            let _ = writeln!(
                out,
                "        throw pybind11::type_error(\"TypeMismatch: {opaque} cannot be accepted \
                 from the host\");"
            );
            out.push_str("        return false;\n    }\n");
        }
    }
}

fn write_cast(out: &mut String, caster: &CasterPlan) {
    let opaque = &caster.opaque_type;
    let _ = writeln!(
        out,
        "    static handle cast(const {opaque} &src, return_value_policy policy, handle parent)"
    );
    out.push_str("    {\n");
    match &caster.produce {
        Some(produce) => {
            out.push_str("        switch (policy)\n        {\n");
            for policy in &caster.policies {
                let _ = writeln!(out, "            case return_value_policy::{policy}:");
            }
            let _ = writeln!(
                out,
                "                return {produce}(src, policy, parent).release();"
            );
            out.push_str("            default:\n");
            let _ = writeln!(
                out,
                "                throw pybind11::cast_error(\"OwnershipError: unsupported \
                 return value policy for {opaque}\");"
            );
            out.push_str("        }\n");
        }
        None => {
            let _ = writeln!(
                out,
                "        throw pybind11::cast_error(\"OwnershipError: {opaque} cannot be \
                 produced for the host\");"
            );
        }
    }
    out.push_str("        return handle();\n    }\n");
}

pub(super) fn write(plan: &WrapPlan, caster: &CasterPlan) -> RegistrationUnit {
    let tidy = cpp_types::tidy_name(&caster.opaque_type);
    let guard = format!("{tidy}_caster_hpp__{FILE_EXTENSION}");
    let opaque = &caster.opaque_type;

    let mut out = String::new();
    push_prefix(&mut out, plan);
    let _ = writeln!(out, "#ifndef {guard}");
    let _ = writeln!(out, "#define {guard}");
    out.push_str("\n#include <pybind11/pybind11.h>\n");
    let _ = writeln!(out, "#include {}", quote_header(&caster.header));
    out.push_str("\nnamespace py = pybind11;\n\nnamespace pybind11\n{\nnamespace detail\n{\n");
    out.push_str("template <>\n");
    let _ = writeln!(out, "struct type_caster<{opaque}>\n{{\npublic:");
    let _ = writeln!(
        out,
        "    PYBIND11_TYPE_CASTER({opaque}, const_name(\"{tidy}\"));\n"
    );
    write_load(&mut out, caster);
    out.push('\n');
    write_cast(&mut out, caster);
    out.push_str("};\n} // namespace detail\n} // namespace pybind11\n");
    let _ = write!(out, "\n#endif // {guard}\n");

    RegistrationUnit::new(caster.file_name(), out)
}
