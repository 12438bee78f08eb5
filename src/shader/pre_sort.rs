//! Sorts each 2048-element block entirely in shared memory: the full network
//! of widths 2 through 2048. Dispatched over the whole buffer capacity, so
//! slots past the live count are written with the sentinel pair.

vulkano_shaders::shader! {
    ty: "compute",
    src: r"
        #version 460

        layout(local_size_x = 1024) in;

        layout(push_constant) uniform PushConstants {
            float sort_sign;
            float null_key;
            uint null_value;
            uint counter_offset;
        };

        layout(set = 0, binding = 0) buffer Keys {
            float keys[];
        };

        layout(set = 0, binding = 1) buffer Values {
            uint values[];
        };

        layout(set = 0, binding = 2) readonly buffer Counter {
            uint counter[];
        };

        shared float gs_keys[2048];
        shared uint gs_values[2048];

        uint insert_one_bit(uint value, uint one_bit_mask) {
            uint mask = one_bit_mask - 1;
            return ((value & ~mask) << 1) | (value & mask) | one_bit_mask;
        }

        void load_element(uint local_index, uint global_index, uint count) {
            if (global_index < count) {
                gs_keys[local_index] = keys[global_index];
                gs_values[local_index] = values[global_index];
            } else {
                gs_keys[local_index] = null_key;
                gs_values[local_index] = null_value;
            }
        }

        void compare_and_swap(uint index1, uint index2) {
            if (gs_keys[index2] * sort_sign < gs_keys[index1] * sort_sign) {
                float key = gs_keys[index1];
                gs_keys[index1] = gs_keys[index2];
                gs_keys[index2] = key;
                uint value = gs_values[index1];
                gs_values[index1] = gs_values[index2];
                gs_values[index2] = value;
            }
        }

        void main() {
            uint count = counter[counter_offset];
            uint tid = gl_LocalInvocationID.x;
            uint group_base = gl_WorkGroupID.x * 2048;

            load_element(tid, group_base + tid, count);
            load_element(tid + 1024, group_base + tid + 1024, count);
            barrier();

            for (uint k = 2; k <= 2048; k *= 2) {
                for (uint j = k / 2; j > 0; j /= 2) {
                    uint index2 = insert_one_bit(tid, j);
                    uint index1 = index2 ^ (k == 2 * j ? k - 1 : j);
                    compare_and_swap(index1, index2);
                    barrier();
                }
            }

            keys[group_base + tid] = gs_keys[tid];
            values[group_base + tid] = gs_values[tid];
            keys[group_base + tid + 1024] = gs_keys[tid + 1024];
            values[group_base + tid + 1024] = gs_values[tid + 1024];
        }
    ",
}
