//! Counter-based RNG kernel generation.
//!
//! The generated kernel implements Philox-4x32-10 with a Box-Muller
//! transform: every group of four output elements is a pure function of
//! (key, counter + element_index / 4). There is no sequential generator
//! state, so disjoint counter ranges can be filled concurrently and the
//! result is identical to a single sequential fill.

use std::fmt::Write;

use crate::codegen::{emit_sig, fill_sig};
use crate::error::Result;
use crate::spec::Spec;

/// Number of output elements produced per counter increment.
pub const BLOCK: usize = 4;

/// Generates the `philox_normal_fill` kernel.
pub struct RngKernelGenerator;

impl RngKernelGenerator {
    /// Algorithm identifier, also used for artifact naming.
    pub const ALGORITHM: &'static str = "philox4x32-10/box-muller";

    pub fn kernel_name() -> &'static str {
        "philox_normal_fill"
    }

    pub fn generate(spec: &Spec) -> Result<String> {
        let t = spec.real().ctype();
        let sx = spec.real().fn_suffix();
        let lit = spec.real().literal_suffix();
        let name = Self::kernel_name();

        let mut src = String::new();
        writeln!(src, "/* {} fill kernel */", Self::ALGORITHM).unwrap();
        src.push_str("#include <math.h>\n");
        src.push_str("#include <stdint.h>\n\n");

        // One Philox-4x32 block: 10 rounds of the multiply-hi/lo mix
        // with the Weyl key schedule.
        src.push_str(
            "static void philox4x32(uint32_t c0, uint32_t c1, uint32_t c2, uint32_t c3,\n\
             \x20                      uint32_t k0, uint32_t k1, uint32_t out[4])\n\
             {\n\
             \x20   for (int round = 0; round < 10; round++)\n\
             \x20   {\n\
             \x20       const uint64_t p0 = (uint64_t)0xD2511F53u * c0;\n\
             \x20       const uint64_t p1 = (uint64_t)0xCD9E8D57u * c2;\n\
             \x20       const uint32_t hi0 = (uint32_t)(p0 >> 32), lo0 = (uint32_t)p0;\n\
             \x20       const uint32_t hi1 = (uint32_t)(p1 >> 32), lo1 = (uint32_t)p1;\n\
             \x20       const uint32_t n0 = hi1 ^ c1 ^ k0;\n\
             \x20       const uint32_t n1 = lo1;\n\
             \x20       const uint32_t n2 = hi0 ^ c3 ^ k1;\n\
             \x20       const uint32_t n3 = lo0;\n\
             \x20       c0 = n0; c1 = n1; c2 = n2; c3 = n3;\n\
             \x20       k0 += 0x9E3779B9u; k1 += 0xBB67AE85u;\n\
             \x20   }\n\
             \x20   out[0] = c0; out[1] = c1; out[2] = c2; out[3] = c3;\n\
             }\n\n",
        );

        emit_sig(&mut src, name, &fill_sig(spec.real()));
        writeln!(src, "void {}(const unsigned long long n,", name).unwrap();
        let pad = " ".repeat(6 + name.len());
        writeln!(src, "{}const unsigned long long counter,", pad).unwrap();
        writeln!(src, "{}const unsigned long long key,", pad).unwrap();
        writeln!(src, "{}{} *restrict out)", pad, t).unwrap();
        src.push_str("{\n");
        src.push_str("    const uint32_t k0 = (uint32_t)key;\n");
        src.push_str("    const uint32_t k1 = (uint32_t)(key >> 32);\n");
        writeln!(
            src,
            "    const {t} two_pi = 6.283185307179586{lit};",
            t = t,
            lit = lit
        )
        .unwrap();
        writeln!(
            src,
            "    const {t} scale = 2.3283064365386963e-10{lit}; /* 2^-32 */",
            t = t,
            lit = lit
        )
        .unwrap();
        src.push_str("    for (unsigned long long block = 0; block * 4 < n; block++)\n");
        src.push_str("    {\n");
        src.push_str("        const unsigned long long c = counter + block;\n");
        src.push_str("        uint32_t bits[4];\n");
        src.push_str(
            "        philox4x32((uint32_t)c, (uint32_t)(c >> 32), 0u, 0u, k0, k1, bits);\n",
        );
        // (bits + 0.5) * 2^-32 lands strictly inside (0, 1), keeping the
        // logarithm finite.
        for i in 0..4 {
            writeln!(
                src,
                "        const {t} u{i} = (({t})bits[{i}] + 0.5{lit}) * scale;",
                t = t,
                i = i,
                lit = lit
            )
            .unwrap();
        }
        writeln!(src, "        const {t} r0 = sqrt{sx}(-2.0{lit} * log{sx}(u0));", t = t, sx = sx, lit = lit).unwrap();
        writeln!(src, "        const {t} r1 = sqrt{sx}(-2.0{lit} * log{sx}(u2));", t = t, sx = sx, lit = lit).unwrap();
        writeln!(src, "        const {t} z0 = r0 * cos{sx}(two_pi * u1);", t = t, sx = sx).unwrap();
        writeln!(src, "        const {t} z1 = r0 * sin{sx}(two_pi * u1);", t = t, sx = sx).unwrap();
        writeln!(src, "        const {t} z2 = r1 * cos{sx}(two_pi * u3);", t = t, sx = sx).unwrap();
        writeln!(src, "        const {t} z3 = r1 * sin{sx}(two_pi * u3);", t = t, sx = sx).unwrap();
        src.push_str("        const unsigned long long base = block * 4;\n");
        src.push_str("        out[base] = z0;\n");
        src.push_str("        if (base + 1 < n) out[base + 1] = z1;\n");
        src.push_str("        if (base + 2 < n) out[base + 2] = z2;\n");
        src.push_str("        if (base + 3 < n) out[base + 3] = z3;\n");
        src.push_str("    }\n");
        src.push_str("}\n");
        Ok(src)
    }
}
