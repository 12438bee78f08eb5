//! Fills the indirect dispatch argument buffer from the live count. One
//! thread per merge width: thread `i` writes the group counts for every
//! outer sub-stage of width `k = 4096 << i` and for its inner pass, starting
//! at slot `i * (i + 3) / 2`. Widths wider than the power of two covering
//! the block-padded count get zero groups.

vulkano_shaders::shader! {
    ty: "compute",
    src: r"
        #version 460

        layout(local_size_x = 22) in;

        layout(push_constant) uniform PushConstants {
            uint counter_offset;
            uint max_iterations;
        };

        layout(set = 0, binding = 0) readonly buffer Counter {
            uint counter[];
        };

        layout(set = 0, binding = 1) writeonly buffer IndirectArgs {
            uint args[];
        };

        uint next_pow2(uint v) {
            return v <= 1 ? v : (2u << findMSB(v - 1));
        }

        void main() {
            uint i = gl_LocalInvocationID.x;
            if (i >= max_iterations) {
                return;
            }

            uint count = counter[counter_offset];
            uint k = 4096u << i;
            if (k > next_pow2((count + 2047u) & ~2047u)) {
                count = 0;
            }

            uint offset = i * (i + 3) / 2 * 3;

            for (uint j = k / 2; j > 1024; j /= 2) {
                uint complete_groups = (count & ~(2 * j - 1)) / 2048;
                int partial = int(count) - int(complete_groups * 2048 + j);
                uint partial_groups = partial > 0 ? (uint(partial) + 1023) / 1024 : 0;
                args[offset] = complete_groups + partial_groups;
                args[offset + 1] = 1;
                args[offset + 2] = 1;
                offset += 3;
            }

            args[offset] = (count + 2047) / 2048;
            args[offset + 1] = 1;
            args[offset + 2] = 1;
        }
    ",
}
